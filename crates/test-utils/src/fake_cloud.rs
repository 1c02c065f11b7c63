//! In-memory stand-ins for the remote collaborators.
//!
//! One [`FakeCloud`] holds shared state; the launcher, signal store, task
//! runtime and result store it hands out all see the same jobs. Each unit
//! follows a [`Script`] (per-launch queue, falling back to a default), and
//! completion markers appear according to a [`ManualClock`].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail};

use testdispatch::context::EnvVars;
use testdispatch::dispatch::TestUnit;
use testdispatch::exec::{BoxFuture, RemoteJobLauncher, SignalStore, TaskExit, TaskRuntime};
use testdispatch::poll::Clock;
use testdispatch::results::{batch_file_name, ResultStore, TestResult, TestStatus};

/// What happens to one launch of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Marker appears `after` the launch; the worker reports `status`.
    Complete { after: Duration, status: TestStatus },
    /// The worker never signals completion.
    Hang,
    /// The container reports the `timeout(1)` exit code.
    TimeoutExit,
    /// The launcher rejects the unit.
    Reject(String),
    /// The launcher accepts but returns a blank job id.
    BlankId,
}

impl Script {
    pub fn pass_after(after: Duration) -> Self {
        Script::Complete {
            after,
            status: TestStatus::Passed,
        }
    }

    pub fn fail_after(after: Duration) -> Self {
        Script::Complete {
            after,
            status: TestStatus::Failed,
        }
    }
}

/// Virtual time: `sleep` advances `now` instantly.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Arc<Mutex<Duration>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }

    pub fn sleep_count(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.sleeps.lock().unwrap().push(duration);
            self.advance(duration);
            tokio::task::yield_now().await;
        })
    }
}

#[derive(Debug, Clone)]
struct FakeJob {
    launched_at: Instant,
    script: Script,
}

#[derive(Debug, Default)]
struct CloudState {
    scripts: HashMap<String, VecDeque<Script>>,
    default_script: Option<Script>,
    jobs: HashMap<String, FakeJob>,
    launches: Vec<String>,
    envs: Vec<EnvVars>,
    next_id: u64,
    failing_polls: usize,
    running: usize,
    peak_running: usize,
}

/// Shared fake backend.
#[derive(Debug, Clone)]
pub struct FakeCloud {
    state: Arc<Mutex<CloudState>>,
    clock: ManualClock,
    results: MemoryResultStore,
    prefix: String,
}

impl FakeCloud {
    /// Every unit passes one second after launch unless scripted otherwise.
    pub fn new() -> Self {
        let cloud = Self {
            state: Arc::new(Mutex::new(CloudState::default())),
            clock: ManualClock::new(),
            results: MemoryResultStore::new(),
            prefix: "testResults".to_string(),
        };
        cloud.set_default(Script::pass_after(Duration::from_secs(1)));
        cloud
    }

    fn lock(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap()
    }

    pub fn set_default(&self, script: Script) {
        self.lock().default_script = Some(script);
    }

    /// Queue scripts for successive launches of `path`.
    pub fn script(&self, path: &str, scripts: impl IntoIterator<Item = Script>) {
        self.lock()
            .scripts
            .entry(path.to_string())
            .or_default()
            .extend(scripts);
    }

    /// Make the next `n` marker checks fail.
    pub fn fail_next_polls(&self, n: usize) {
        self.lock().failing_polls = n;
    }

    pub fn launcher(&self) -> FakeLauncher {
        FakeLauncher { cloud: self.clone() }
    }

    pub fn signals(&self) -> FakeSignalStore {
        FakeSignalStore { cloud: self.clone() }
    }

    pub fn task_runtime(&self) -> FakeTaskRuntime {
        FakeTaskRuntime { cloud: self.clone() }
    }

    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    pub fn results(&self) -> MemoryResultStore {
        self.results.clone()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Unit paths in launch order, rejected launches included.
    pub fn launches(&self) -> Vec<String> {
        self.lock().launches.clone()
    }

    pub fn launch_envs(&self) -> Vec<EnvVars> {
        self.lock().envs.clone()
    }

    pub fn peak_running(&self) -> usize {
        self.lock().peak_running
    }

    fn start(&self, unit: &TestUnit, env: &EnvVars) -> anyhow::Result<String> {
        let mut state = self.lock();
        state.launches.push(unit.path.clone());
        state.envs.push(env.clone());

        let queued = state.scripts.get_mut(&unit.path).and_then(VecDeque::pop_front);
        let script = queued
            .or_else(|| state.default_script.clone())
            .unwrap_or(Script::Hang);

        match &script {
            Script::Reject(reason) => bail!("{reason}"),
            Script::BlankId => return Ok("  ".to_string()),
            _ => {}
        }

        state.next_id += 1;
        let id = format!("job-{}", state.next_id);

        if let Script::Complete { status, .. } = &script {
            self.results.write_batch(
                &self.prefix,
                vec![TestResult {
                    test_id: id.clone(),
                    title: format!("{} works", unit.file_name()),
                    path_to_test: unit.path.clone(),
                    status: *status,
                    started_at: None,
                    ended_at: None,
                }],
            );
        }

        state.jobs.insert(
            id.clone(),
            FakeJob {
                launched_at: self.clock.now(),
                script,
            },
        );
        Ok(id)
    }

    fn job(&self, id: &str) -> anyhow::Result<FakeJob> {
        self.lock()
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown job '{id}'"))
    }
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct FakeLauncher {
    cloud: FakeCloud,
}

impl RemoteJobLauncher for FakeLauncher {
    fn launch<'a>(
        &'a self,
        unit: &'a TestUnit,
        env: &'a EnvVars,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move { self.cloud.start(unit, env) })
    }
}

#[derive(Debug, Clone)]
pub struct FakeSignalStore {
    cloud: FakeCloud,
}

impl SignalStore for FakeSignalStore {
    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<bool>> {
        Box::pin(async move {
            {
                let mut state = self.cloud.lock();
                if state.failing_polls > 0 {
                    state.failing_polls -= 1;
                    bail!("signal store unavailable");
                }
            }

            let Some(id) = key
                .strip_suffix("/test.complete")
                .and_then(|rest| rest.rsplit('/').next())
            else {
                return Ok(false);
            };
            let Ok(job) = self.cloud.job(id) else {
                return Ok(false);
            };

            Ok(match job.script {
                Script::Complete { after, .. } => {
                    self.cloud.clock.now() >= job.launched_at + after
                }
                _ => false,
            })
        })
    }
}

#[derive(Debug, Clone)]
pub struct FakeTaskRuntime {
    cloud: FakeCloud,
}

impl TaskRuntime for FakeTaskRuntime {
    fn launch<'a>(
        &'a self,
        unit: &'a TestUnit,
        env: &'a EnvVars,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move { self.cloud.start(unit, env) })
    }

    /// Real (short) sleeps, so concurrently awaited tasks overlap.
    fn wait_stopped<'a>(
        &'a self,
        handle: &'a str,
        max_wait: Duration,
    ) -> BoxFuture<'a, anyhow::Result<TaskExit>> {
        Box::pin(async move {
            let job = self.cloud.job(handle)?;
            {
                let mut state = self.cloud.lock();
                state.running += 1;
                state.peak_running = state.peak_running.max(state.running);
            }

            let exit = match job.script {
                Script::Complete { after, status } => {
                    tokio::time::sleep(after.min(max_wait)).await;
                    let code = if status == TestStatus::Failed { 1 } else { 0 };
                    Ok(TaskExit {
                        exit_code: Some(code),
                    })
                }
                Script::TimeoutExit => Ok(TaskExit {
                    exit_code: Some(TaskExit::TIMEOUT_EXIT_CODE),
                }),
                _ => Err(anyhow!("task '{handle}' still running after {max_wait:?}")),
            };

            self.cloud.lock().running -= 1;
            exit
        })
    }
}

/// Result batches held in memory, named `{prefix}-{n}.json` with `n`
/// strictly increasing.
#[derive(Debug, Clone, Default)]
pub struct MemoryResultStore {
    batches: Arc<Mutex<BTreeMap<String, String>>>,
    next_stamp: Arc<Mutex<u64>>,
    listing_fails: Arc<Mutex<bool>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self {
            next_stamp: Arc::new(Mutex::new(1_700_000_000_000)),
            ..Self::default()
        }
    }

    /// Store `results` under the next timestamp; returns the batch name.
    pub fn write_batch(&self, prefix: &str, results: Vec<TestResult>) -> String {
        let stamp = {
            let mut next = self.next_stamp.lock().unwrap();
            *next += 1;
            *next
        };
        let name = batch_file_name(prefix, stamp);
        let json = serde_json::to_string(&results).expect("results serialize");
        self.batches.lock().unwrap().insert(name.clone(), json);
        name
    }

    /// Store raw text under an explicit name (e.g. a corrupt batch).
    pub fn put_raw(&self, name: &str, text: &str) {
        self.batches
            .lock()
            .unwrap()
            .insert(name.to_string(), text.to_string());
    }

    /// Simulate a missing results directory.
    pub fn fail_listing(&self) {
        *self.listing_fails.lock().unwrap() = true;
    }
}

impl ResultStore for MemoryResultStore {
    fn batch_names(&self) -> BoxFuture<'_, anyhow::Result<Vec<String>>> {
        Box::pin(async move {
            if *self.listing_fails.lock().unwrap() {
                bail!("results directory does not exist");
            }
            Ok(self.batches.lock().unwrap().keys().cloned().collect())
        })
    }

    fn read_batch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<TestResult>>> {
        Box::pin(async move {
            let text = self
                .batches
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("no batch named '{name}'"))?;
            Ok(serde_json::from_str(&text)?)
        })
    }
}
