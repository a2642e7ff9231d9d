use std::collections::VecDeque;

pub struct MovingAverage {
    window: usize,
    scores: VecDeque<u32>,
    sum: u64,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        assert!(window > 0, "moving average over an empty window");
        Self {
            window,
            scores: VecDeque::with_capacity(window),
            sum: 0,
        }
    }

    pub fn push(&mut self, score: u32) {
        if self.scores.len() == self.window {
            if let Some(oldest) = self.scores.pop_front() {
                self.sum -= u64::from(oldest);
            }
        }
        self.scores.push_back(score);
        self.sum += u64::from(score);
    }

    /// `None` until the first score arrives.
    pub fn average(&self) -> Option<f64> {
        if self.scores.is_empty() {
            None
        } else {
            Some(self.sum as f64 / self.scores.len() as f64)
        }
    }
}

/// Final scores of completed episodes, summarized for progress reports.
pub struct ScoreBoard {
    short: MovingAverage,
    long: MovingAverage,
    best: Option<u32>,
    last: Option<u32>,
}

impl Default for ScoreBoard {
    fn default() -> Self {
        Self {
            short: MovingAverage::new(20),
            long: MovingAverage::new(100),
            best: None,
            last: None,
        }
    }
}

impl ScoreBoard {
    pub fn record(&mut self, score: u32) {
        self.short.push(score);
        self.long.push(score);
        self.best = Some(self.best.map_or(score, |best| best.max(score)));
        self.last = Some(score);
    }

    pub fn summary(&self) -> ScoreSummary {
        ScoreSummary {
            average_20: self.short.average(),
            average_100: self.long.average(),
            best: self.best,
            last: self.last,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScoreSummary {
    pub average_20: Option<f64>,
    pub average_100: Option<f64>,
    pub best: Option<u32>,
    pub last: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_forgets_old_scores() {
        let mut average = MovingAverage::new(3);
        assert_eq!(average.average(), None);
        for score in [10, 20, 30, 40] {
            average.push(score);
        }
        assert_eq!(average.average(), Some(30.0));
    }

    #[test]
    fn board_tracks_best_and_last() {
        let mut board = ScoreBoard::default();
        for score in 0..30 {
            board.record(score);
        }
        board.record(3);
        let summary = board.summary();
        assert_eq!(summary.best, Some(29));
        assert_eq!(summary.last, Some(3));
        // last 20: 11..=29 and 3
        assert_eq!(summary.average_20, Some((380.0 + 3.0) / 20.0));
        assert_eq!(summary.average_100, Some((435.0 + 3.0) / 31.0));
    }
}
