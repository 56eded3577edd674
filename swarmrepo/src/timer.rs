use std::{
    fmt,
    time::{
        Duration,
        Instant,
    },
};

use crate::error::TimerError;

#[derive(Debug)]
struct Phase {
    name: String,
    started: Instant,
    elapsed: Option<Duration>,
}

/// Accumulates named phase durations for diagnostics; each phase may be
/// started and stopped exactly once.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    phases: Vec<Phase>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&mut self, name: &str) -> Option<&mut Phase> {
        self.phases.iter_mut().find(|phase| phase.name == name)
    }

    pub fn start(&mut self, name: &str) -> Result<(), TimerError> {
        if self.find(name).is_some() {
            return Err(TimerError::AlreadyStarted(name.to_string()));
        }
        self.phases.push(Phase {
            name: name.to_string(),
            started: Instant::now(),
            elapsed: None,
        });
        Ok(())
    }

    pub fn stop(&mut self, name: &str) -> Result<Duration, TimerError> {
        let phase = self.find(name)
            .ok_or_else(|| TimerError::NotStarted(name.to_string()))?;
        if phase.elapsed.is_some() {
            return Err(TimerError::AlreadyStopped(name.to_string()));
        }
        let elapsed = phase.started.elapsed();
        phase.elapsed = Some(elapsed);
        Ok(elapsed)
    }

    pub fn elapsed(&self, name: &str) -> Option<Duration> {
        self.phases.iter()
            .find(|phase| phase.name == name)
            .and_then(|phase| phase.elapsed)
    }

    pub fn total(&self) -> Duration {
        self.phases.iter()
            .filter_map(|phase| phase.elapsed)
            .sum()
    }
}

impl fmt::Display for PhaseTimer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.phases.is_empty() {
            return f.write_str("no phases recorded");
        }
        for (i, phase) in self.phases.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match phase.elapsed {
                Some(elapsed) => write!(f, "{}: {:.3}s", phase.name, elapsed.as_secs_f64())?,
                None => write!(f, "{}: running", phase.name)?,
            }
        }
        Ok(())
    }
}
