use serde::{Deserialize, Serialize};

/// Keyboard input the agent can send to the game. `Nothing` skips the frame
/// without pressing a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Nothing,
    Left,
    Right,
    Up,
    Down,
}

impl Action {
    pub const ALL: [Self; 5] = [
        Self::Nothing,
        Self::Left,
        Self::Right,
        Self::Up,
        Self::Down,
    ];

    pub const fn n_actions() -> u8 {
        Self::ALL.len() as u8
    }

    pub const fn index(self) -> u8 {
        match self {
            Self::Nothing => 0,
            Self::Left => 1,
            Self::Right => 2,
            Self::Up => 3,
            Self::Down => 4,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_matches_position_in_all() {
        for (position, action) in Action::ALL.iter().enumerate() {
            assert_eq!(usize::from(action.index()), position);
            assert_eq!(Action::from_index(action.index()), Some(*action));
        }
        assert_eq!(Action::from_index(Action::n_actions()), None);
    }
}
