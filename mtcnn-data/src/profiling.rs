//! The profiling toolkit that can be disabled in compile-time.

#[cfg(feature = "profiling")]
use crate::common::*;
#[cfg(feature = "profiling")]
use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

#[cfg(feature = "profiling")]
lazy_static::lazy_static! {
    static ref PROFILING_CONFIG: ProfilingConfig = {
        match envy::prefixed("MTCNN_").from_env() {
            Ok(config) => config,
            Err(err) => {
                warn!("failed to load profiling environment variables, fallback to default values: {:?}", err);
                Default::default()
            }
        }
    };
}

#[cfg(feature = "profiling")]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
struct ProfilingConfig {
    profiling_whitelist: Option<HashSet<String>>,
}

/// Accumulated stage durations of a repeated procedure.
#[cfg(feature = "profiling")]
#[derive(Debug)]
pub struct Timing {
    name: &'static str,
    instant: Instant,
    elapsed: Vec<(&'static str, Duration)>,
}

#[cfg(not(feature = "profiling"))]
#[derive(Debug)]
pub struct Timing;

impl Timing {
    pub fn new(name: &'static str) -> Self {
        #[cfg(feature = "profiling")]
        {
            Self {
                name,
                instant: Instant::now(),
                elapsed: vec![],
            }
        }

        #[cfg(not(feature = "profiling"))]
        {
            let _ = name;
            Self
        }
    }

    /// Restart the clock without recording.
    pub fn start(&mut self) {
        #[cfg(feature = "profiling")]
        {
            self.instant = Instant::now();
        }
    }

    /// Add the time since the last mark to the stage `name`.
    pub fn set_record(&mut self, name: &'static str) {
        #[cfg(feature = "profiling")]
        {
            let elapsed = self.instant.elapsed();
            match self.elapsed.iter_mut().find(|(stage, _)| *stage == name) {
                Some((_, total)) => *total += elapsed,
                None => self.elapsed.push((name, elapsed)),
            }
            self.instant = Instant::now();
        }

        #[cfg(not(feature = "profiling"))]
        let _ = name;
    }

    pub fn report(&self) {
        #[cfg(feature = "profiling")]
        {
            let can_report = PROFILING_CONFIG
                .profiling_whitelist
                .as_ref()
                .map(|whitelist| whitelist.contains(self.name))
                .unwrap_or(true);

            if can_report {
                info!("profiling report for '{}'", self.name);
                self.elapsed.iter().for_each(|(name, elapsed)| {
                    info!("- {}\t{:?}", name, elapsed);
                });
            }
        }
    }
}
