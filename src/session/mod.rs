//! Training session orchestration
//!
//! A [`Session`] owns one [`GridWorld`] + [`QLearningAgent`] pair and
//! arbitrates between two callers: the synchronous manual-control path and a
//! background training loop. Both go through a single mutex around the
//! shared pair, so the mode check and the mutation it guards are atomic -
//! there is no window between "am I allowed?" and "do it".
//!
//! The loop is cancelled cooperatively: `stop_training` raises a flag that
//! the loop polls at episode and step boundaries, so a stop request lets the
//! in-flight step finish. Speed changes are atomic stores read before every
//! sleep, which is why they apply mid-episode.

pub mod observers;

use std::{
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    env::GridWorld,
    error::{Error, Result},
    ports::TrainingObserver,
    q_learning::{AgentStats, QLearningAgent},
    types::{Action, Position, StateKey, StateSnapshot},
};

/// Hard cap on steps per training episode.
const MAX_EPISODE_STEPS: u32 = 200;

/// Reward delta that marks a successful delivery and ends the episode.
const DELIVERY_REWARD: f64 = 10.0;

/// Orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// No environment/agent pair yet.
    Idle,
    /// Pair constructed, no background loop running.
    ManualReady,
    /// Background episodic loop active.
    Training,
}

/// Partial hyperparameter update; unset fields preserve current values.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    pub gamma: Option<f64>,
    pub alpha: Option<f64>,
    pub epsilon: Option<f64>,
}

/// One completed episode: how long it took and what it earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub episode: usize,
    pub steps: u32,
    pub total_reward: f64,
}

/// Full result of one environment step, shared by the manual path and the
/// training loop's step events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepUpdate {
    pub episode: usize,
    pub step: u32,
    pub action: Action,
    pub reward: f64,
    pub total_reward: f64,
    pub state: StateSnapshot,
    pub agent: AgentStats,
}

/// Aggregate training statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    pub current_episode: usize,
    pub target_episodes: usize,
    pub mode: Mode,
    pub speed: u32,
    pub episodes_completed: usize,
    /// Mean reward over the most recent 100 episodes.
    pub average_reward: f64,
    /// Mean step count over the most recent 100 episodes.
    pub average_steps: f64,
    pub last_rewards: Vec<f64>,
    pub last_steps: Vec<u32>,
}

/// Payload of the episode-complete event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub steps: u32,
    pub total_reward: f64,
    pub stats: TrainingStats,
    pub agent: AgentStats,
}

/// Payload of the training-complete event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub episodes_completed: usize,
    pub stats: TrainingStats,
    pub agent: AgentStats,
}

/// One learned Q-table entry, for full-table introspection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub state: StateKey,
    pub action: Action,
    pub value: f64,
}

struct Sim {
    env: GridWorld,
    agent: QLearningAgent,
}

struct Inner {
    sim: Option<Sim>,
    mode: Mode,
    episode: usize,
    target_episodes: usize,
    history: Vec<EpisodeRecord>,
}

struct Shared {
    inner: Mutex<Inner>,
    stop: AtomicBool,
    speed: AtomicU32,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

type ObserverSet = Arc<Mutex<Vec<Box<dyn TrainingObserver>>>>;

fn validate_speed(speed: u32) -> Result<()> {
    match speed {
        1 | 10 | 100 => Ok(()),
        _ => Err(Error::InvalidSpeed { speed }),
    }
}

/// Inter-step pacing delay for a speed multiplier.
fn delay_for(speed: u32) -> Duration {
    match speed {
        100 => Duration::from_millis(5),
        10 => Duration::from_millis(50),
        _ => Duration::from_millis(500),
    }
}

/// A simulation session: one environment, one agent, one optional training
/// worker.
///
/// Sessions are explicitly constructed and passed around; there is no
/// process-global state, so independent sessions can coexist (one per
/// connection, one per test).
pub struct Session {
    shared: Arc<Shared>,
    observers: ObserverSet,
    worker: Option<JoinHandle<()>>,
    seed: Option<u64>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    sim: None,
                    mode: Mode::Idle,
                    episode: 0,
                    target_episodes: 0,
                    history: Vec::new(),
                }),
                stop: AtomicBool::new(false),
                speed: AtomicU32::new(1),
            }),
            observers: Arc::new(Mutex::new(Vec::new())),
            worker: None,
            seed: None,
        }
    }

    /// Seed the environment and agent RNGs of every pair this session
    /// creates, for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Register an observer for training-loop events.
    pub fn subscribe(&self, observer: Box<dyn TrainingObserver>) {
        self.lock_observers().push(observer);
    }

    /// Create (or replace) the environment/agent pair and enter manual mode.
    ///
    /// Clears episode history and counters. The agent starts with the
    /// default hyperparameters (gamma 0.9, alpha 0.1, epsilon 0.1).
    pub fn create(&mut self, grid_size: u8, obstacles: &[Position]) -> Result<StateSnapshot> {
        if !(3..=4).contains(&grid_size) {
            return Err(Error::InvalidGridSize { size: grid_size });
        }
        let max = usize::from(grid_size) - 1;
        if obstacles.len() > max {
            return Err(Error::TooManyObstacles {
                count: obstacles.len(),
                max,
                grid_size,
            });
        }
        if self.shared.lock().mode == Mode::Training {
            return Err(Error::TrainingInProgress);
        }
        self.reap_worker()?;

        let mut env = GridWorld::new(grid_size, obstacles)?;
        let mut agent = QLearningAgent::default();
        if let Some(seed) = self.seed {
            env = env.with_seed(seed);
            agent = agent.with_seed(seed.wrapping_add(1));
        }

        let snapshot = env.snapshot();
        let mut inner = self.shared.lock();
        inner.sim = Some(Sim { env, agent });
        inner.mode = Mode::ManualReady;
        inner.episode = 0;
        inner.target_episodes = 0;
        inner.history.clear();
        drop(inner);
        self.shared.stop.store(false, Ordering::SeqCst);
        Ok(snapshot)
    }

    /// Apply a partial hyperparameter update.
    ///
    /// All provided values are validated before any is applied, so a bad
    /// request leaves the agent untouched.
    pub fn configure_agent(&self, config: AgentConfig) -> Result<AgentStats> {
        for (name, value) in [
            ("gamma", config.gamma),
            ("alpha", config.alpha),
            ("epsilon", config.epsilon),
        ] {
            if let Some(value) = value
                && !(0.0..=1.0).contains(&value)
            {
                return Err(Error::InvalidHyperparameter { name, value });
            }
        }

        let mut inner = self.shared.lock();
        let sim = inner.sim.as_mut().ok_or(Error::NotInitialized)?;
        if let Some(gamma) = config.gamma {
            sim.agent.set_gamma(gamma)?;
        }
        if let Some(alpha) = config.alpha {
            sim.agent.set_alpha(alpha)?;
        }
        if let Some(epsilon) = config.epsilon {
            sim.agent.set_epsilon(epsilon)?;
        }
        Ok(sim.agent.parameters())
    }

    /// Execute a single step outside of training.
    ///
    /// `None` defers the choice to the agent's epsilon-greedy policy. The
    /// step runs the exact observe/act/update pipeline the training loop
    /// uses, including the Bellman update.
    pub fn manual_step(&self, action: Option<Action>) -> Result<StepUpdate> {
        let mut inner = self.shared.lock();
        match inner.mode {
            Mode::Idle => Err(Error::NotInitialized),
            Mode::Training => Err(Error::TrainingInProgress),
            Mode::ManualReady => {
                let episode = inner.episode;
                let sim = inner.sim.as_mut().ok_or(Error::NotInitialized)?;
                let mut update = run_step(sim, action);
                update.episode = episode;
                Ok(update)
            }
        }
    }

    /// Start the background episodic loop.
    ///
    /// `episodes == 0` runs until explicitly stopped.
    pub fn start_training(&mut self, episodes: usize, speed: u32) -> Result<()> {
        validate_speed(speed)?;
        // Check the mode before joining the previous worker: a live loop
        // means Training, and joining it here would block indefinitely.
        {
            let inner = self.shared.lock();
            match inner.mode {
                Mode::Idle => return Err(Error::NotInitialized),
                Mode::Training => return Err(Error::AlreadyTraining),
                Mode::ManualReady => {}
            }
        }
        self.reap_worker()?;

        {
            let mut inner = self.shared.lock();
            inner.target_episodes = episodes;
            inner.episode = 0;
            inner.mode = Mode::Training;
        }
        self.shared.stop.store(false, Ordering::SeqCst);
        self.shared.speed.store(speed, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let observers = Arc::clone(&self.observers);
        match thread::Builder::new()
            .name("taxigrid-training".to_string())
            .spawn(move || training_loop(&shared, &observers))
        {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(source) => {
                self.shared.lock().mode = Mode::ManualReady;
                Err(Error::Io {
                    operation: "spawn training worker".to_string(),
                    source,
                })
            }
        }
    }

    /// Request a cooperative stop of the training loop.
    ///
    /// The loop observes the flag at its next step or episode boundary, so
    /// the in-flight step may complete before the session returns to
    /// [`Mode::ManualReady`].
    pub fn stop_training(&self) -> Result<()> {
        let inner = self.shared.lock();
        if inner.mode != Mode::Training {
            return Err(Error::NotTraining);
        }
        self.shared.stop.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Change the pacing multiplier; valid in any mode and picked up by an
    /// in-progress loop before its next sleep.
    pub fn set_speed(&self, speed: u32) -> Result<()> {
        validate_speed(speed)?;
        self.shared.speed.store(speed, Ordering::SeqCst);
        Ok(())
    }

    /// Reset the environment (and optionally the agent's table), clearing
    /// episode history. If training is running it is stopped first and the
    /// worker joined, so the loop has quiesced before state is mutated.
    pub fn reset(&mut self, reset_agent: bool) -> Result<StateSnapshot> {
        {
            let inner = self.shared.lock();
            if inner.sim.is_none() {
                return Err(Error::NotInitialized);
            }
            if inner.mode == Mode::Training {
                self.shared.stop.store(true, Ordering::SeqCst);
            }
        }
        self.reap_worker()?;

        let mut inner = self.shared.lock();
        let sim = inner.sim.as_mut().ok_or(Error::NotInitialized)?;
        let snapshot = sim.env.reset();
        if reset_agent {
            sim.agent.reset();
        }
        inner.episode = 0;
        inner.target_episodes = 0;
        inner.history.clear();
        inner.mode = Mode::ManualReady;
        drop(inner);
        self.shared.stop.store(false, Ordering::SeqCst);
        Ok(snapshot)
    }

    /// Block until the training worker exits. Only sensible with a bounded
    /// episode target; an unbounded run must be stopped first.
    pub fn wait(&mut self) -> Result<()> {
        self.reap_worker()
    }

    pub fn mode(&self) -> Mode {
        self.shared.lock().mode
    }

    /// Current state snapshot.
    pub fn state(&self) -> Result<StateSnapshot> {
        let inner = self.shared.lock();
        let sim = inner.sim.as_ref().ok_or(Error::NotInitialized)?;
        Ok(sim.env.snapshot())
    }

    /// Q-values for the given state, or for the current environment state.
    pub fn q_values(&self, state: Option<StateKey>) -> Result<Vec<(Action, f64)>> {
        let inner = self.shared.lock();
        let sim = inner.sim.as_ref().ok_or(Error::NotInitialized)?;
        let state = state.unwrap_or_else(|| sim.env.state_key());
        Ok(sim.agent.values_for_state(&state))
    }

    /// Every learned Q-table entry.
    pub fn full_table(&self) -> Result<Vec<TableEntry>> {
        let inner = self.shared.lock();
        let sim = inner.sim.as_ref().ok_or(Error::NotInitialized)?;
        Ok(sim
            .agent
            .q_table()
            .entries()
            .map(|(&(state, action), &value)| TableEntry {
                state,
                action,
                value,
            })
            .collect())
    }

    /// Current agent hyperparameters and table size.
    pub fn agent_stats(&self) -> Result<AgentStats> {
        let inner = self.shared.lock();
        let sim = inner.sim.as_ref().ok_or(Error::NotInitialized)?;
        Ok(sim.agent.parameters())
    }

    /// Aggregate training statistics for the session.
    pub fn training_stats(&self) -> TrainingStats {
        let inner = self.shared.lock();
        compute_stats(&inner, self.shared.speed.load(Ordering::SeqCst))
    }

    /// Completed-episode history, oldest first.
    pub fn history(&self) -> Vec<EpisodeRecord> {
        self.shared.lock().history.clone()
    }

    /// The agent's decision explanation for the current state.
    pub fn explain_decision(&self) -> Result<String> {
        let mut inner = self.shared.lock();
        match inner.mode {
            Mode::Idle => Err(Error::NotInitialized),
            Mode::Training => Err(Error::TrainingInProgress),
            Mode::ManualReady => {
                let sim = inner.sim.as_mut().ok_or(Error::NotInitialized)?;
                let state = sim.env.state_key();
                Ok(sim.agent.explain_decision(&state))
            }
        }
    }

    fn lock_observers(&self) -> MutexGuard<'_, Vec<Box<dyn TrainingObserver>>> {
        self.observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Join a worker whose loop has already exited (or is about to).
    fn reap_worker(&mut self) -> Result<()> {
        if let Some(handle) = self.worker.take() {
            handle.join().map_err(|_| Error::WorkerPanicked)?;
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// One observe/act/update pipeline step. The caller fills in `episode`.
fn run_step(sim: &mut Sim, chosen: Option<Action>) -> StepUpdate {
    let state = sim.env.state_key();
    let action = chosen.unwrap_or_else(|| sim.agent.select_action(&state));

    let reward_before = sim.env.total_reward();
    let snapshot = sim.env.step(action);
    let reward = snapshot.total_reward - reward_before;

    let next_state = sim.env.state_key();
    sim.agent.update(&state, action, reward, &next_state);

    StepUpdate {
        episode: 0,
        step: snapshot.steps,
        action,
        reward,
        total_reward: snapshot.total_reward,
        state: snapshot,
        agent: sim.agent.parameters(),
    }
}

fn compute_stats(inner: &Inner, speed: u32) -> TrainingStats {
    let history = &inner.history;
    let window = &history[history.len().saturating_sub(100)..];
    let (average_reward, average_steps) = if window.is_empty() {
        (0.0, 0.0)
    } else {
        let n = window.len() as f64;
        (
            window.iter().map(|r| r.total_reward).sum::<f64>() / n,
            window.iter().map(|r| f64::from(r.steps)).sum::<f64>() / n,
        )
    };
    let tail = &history[history.len().saturating_sub(10)..];

    TrainingStats {
        current_episode: inner.episode,
        target_episodes: inner.target_episodes,
        mode: inner.mode,
        speed,
        episodes_completed: history.len(),
        average_reward,
        average_steps,
        last_rewards: tail.iter().map(|r| r.total_reward).collect(),
        last_steps: tail.iter().map(|r| r.steps).collect(),
    }
}

fn emit<F>(observers: &ObserverSet, mut notify: F)
where
    F: FnMut(&mut dyn TrainingObserver) -> Result<()>,
{
    let mut observers = observers
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    for observer in observers.iter_mut() {
        if let Err(err) = notify(observer.as_mut()) {
            eprintln!("Warning: training observer failed: {err}");
        }
    }
}

/// The background episodic loop.
///
/// Runs until the stop flag is raised or the episode target is reached,
/// then returns the session to manual mode and emits the final summary.
fn training_loop(shared: &Arc<Shared>, observers: &ObserverSet) {
    loop {
        // Episode boundary: check for cancellation/completion, then reset.
        let (episode, start_snapshot) = {
            let mut inner = shared.lock();
            if shared.stop.load(Ordering::SeqCst) {
                break;
            }
            if inner.target_episodes > 0 && inner.episode >= inner.target_episodes {
                break;
            }
            inner.episode += 1;
            let episode = inner.episode;
            let Some(sim) = inner.sim.as_mut() else { break };
            (episode, sim.env.reset())
        };
        emit(observers, |o| o.on_episode_start(episode, &start_snapshot));

        let record = run_episode_steps(shared, observers, episode);

        let summary = {
            let mut inner = shared.lock();
            inner.history.push(record.clone());
            let stats = compute_stats(&inner, shared.speed.load(Ordering::SeqCst));
            let Some(sim) = inner.sim.as_ref() else { break };
            EpisodeSummary {
                episode: record.episode,
                steps: record.steps,
                total_reward: record.total_reward,
                stats,
                agent: sim.agent.parameters(),
            }
        };
        emit(observers, |o| o.on_episode_complete(&summary));
    }

    let summary = {
        let mut inner = shared.lock();
        inner.mode = Mode::ManualReady;
        let stats = compute_stats(&inner, shared.speed.load(Ordering::SeqCst));
        let agent = inner
            .sim
            .as_ref()
            .map(|sim| sim.agent.parameters())
            .unwrap_or(AgentStats {
                gamma: 0.0,
                alpha: 0.0,
                epsilon: 0.0,
                q_table_size: 0,
            });
        TrainingSummary {
            episodes_completed: inner.history.len(),
            stats,
            agent,
        }
    };
    shared.stop.store(false, Ordering::SeqCst);
    emit(observers, |o| o.on_training_complete(&summary));
}

/// Run the step phase of one episode: up to [`MAX_EPISODE_STEPS`] pipeline
/// steps, ending early on a stop request or a successful delivery.
fn run_episode_steps(shared: &Shared, observers: &ObserverSet, episode: usize) -> EpisodeRecord {
    let mut steps = 0u32;
    let mut total_reward = 0.0;

    while steps < MAX_EPISODE_STEPS {
        if shared.stop.load(Ordering::SeqCst) {
            break;
        }

        let update = {
            let mut inner = shared.lock();
            let Some(sim) = inner.sim.as_mut() else { break };
            let mut update = run_step(sim, None);
            update.episode = episode;
            update
        };
        steps = update.step;
        total_reward = update.total_reward;
        let delivered = update.reward == DELIVERY_REWARD;
        emit(observers, |o| o.on_step(&update));

        if delivered {
            break;
        }
        thread::sleep(delay_for(shared.speed.load(Ordering::SeqCst)));
    }

    EpisodeRecord {
        episode,
        steps,
        total_reward,
    }
}
