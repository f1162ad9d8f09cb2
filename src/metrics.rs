use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use lazy_static::lazy_static;

use crate::errors::Error;

pub const METRICS_NAMESPACE: &str = "appliance_deployer";

lazy_static! {
    pub static ref RUNS: IntCounterVec = IntCounterVec::new(
      Opts::new("runs", "appliance-deployer runs by outcome")
      .namespace(METRICS_NAMESPACE),
      &["outcome"]
    ).unwrap();
    pub static ref STEP_FAILURES: IntCounterVec = IntCounterVec::new(
      Opts::new("step_failures", "appliance-deployer failed orchestration steps")
      .namespace(METRICS_NAMESPACE),
      &["step"]
    ).unwrap();
    pub static ref CREATE_USER_ATTEMPTS: IntCounter = IntCounter::with_opts(
      Opts::new("create_user_attempts", "appliance-deployer first user creation attempts")
      .namespace(METRICS_NAMESPACE)
    ).unwrap();
}

pub fn custom_metrics(registry: &Registry) {
  registry.register(Box::new(RUNS.clone())).unwrap();
  registry.register(Box::new(STEP_FAILURES.clone())).unwrap();
  registry.register(Box::new(CREATE_USER_ATTEMPTS.clone())).unwrap();
}

pub fn run_finished(outcome: &str) {
  RUNS.with_label_values(&[outcome]).inc_by(1);
}

pub fn step_failed(step: &str) {
  STEP_FAILURES.with_label_values(&[step]).inc_by(1);
}

pub fn create_user_attempted(attempts: usize) {
  CREATE_USER_ATTEMPTS.inc_by(attempts as u64);
}

/// Text exposition of everything in `registry`
pub fn render(registry: &Registry) -> Result<String, Error> {
  let mut buffer = Vec::new();
  TextEncoder::new()
    .encode(&registry.gather(), &mut buffer)
    .map_err(|err| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))?;
  Ok(String::from_utf8_lossy(&buffer).into_owned())
}
