use crate::GameEnv;
use std::ops::{Deref, DerefMut};

/// Owns an environment and shuts it down when dropped, on every exit path of
/// the worker that holds it.
pub struct EnvGuard<E: GameEnv> {
    env: E,
}

impl<E: GameEnv> EnvGuard<E> {
    pub fn new(env: E) -> Self {
        Self { env }
    }
}

impl<E: GameEnv> Deref for EnvGuard<E> {
    type Target = E;
    fn deref(&self) -> &E {
        &self.env
    }
}

impl<E: GameEnv> DerefMut for EnvGuard<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.env
    }
}

impl<E: GameEnv> Drop for EnvGuard<E> {
    fn drop(&mut self) {
        self.env.shutdown();
    }
}
