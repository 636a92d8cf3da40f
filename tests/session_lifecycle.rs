//! Integration tests for the session state machine and training loop.

use std::time::{Duration, Instant};

use taxigrid::{
    Action, AgentConfig, ChannelObserver, Error, Mode, Position, Session, TrainingEvent,
};

fn wait_for_manual_mode(session: &Session) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while session.mode() != Mode::ManualReady {
        assert!(
            Instant::now() < deadline,
            "training loop failed to quiesce in time"
        );
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn uninitialized_session_rejects_operations() {
    let mut session = Session::new();
    assert!(matches!(
        session.manual_step(None),
        Err(Error::NotInitialized)
    ));
    assert!(matches!(
        session.start_training(5, 100),
        Err(Error::NotInitialized)
    ));
    assert!(matches!(session.state(), Err(Error::NotInitialized)));
    assert!(matches!(session.stop_training(), Err(Error::NotTraining)));
    assert!(matches!(session.reset(false), Err(Error::NotInitialized)));
}

#[test]
fn create_validates_grid_size_and_obstacle_count() {
    let mut session = Session::new();
    assert!(matches!(
        session.create(5, &[]),
        Err(Error::InvalidGridSize { size: 5 })
    ));

    let too_many = [
        Position::new(1, 1),
        Position::new(2, 2),
        Position::new(1, 2),
    ];
    assert!(matches!(
        session.create(3, &too_many),
        Err(Error::TooManyObstacles { count: 3, max: 2, .. })
    ));

    let snapshot = session.create(3, &[Position::new(1, 1)]).unwrap();
    assert_eq!(snapshot.grid_size, 3);
    assert_eq!(snapshot.taxi, Position::new(0, 0));
    assert_eq!(session.mode(), Mode::ManualReady);
}

#[test]
fn configure_agent_applies_partial_updates_and_rejects_bad_values() {
    let mut session = Session::new().with_seed(5);
    session.create(3, &[]).unwrap();

    let stats = session
        .configure_agent(AgentConfig {
            gamma: Some(0.5),
            ..AgentConfig::default()
        })
        .unwrap();
    assert_eq!(stats.gamma, 0.5);
    assert_eq!(stats.alpha, 0.1, "unset fields keep their defaults");
    assert_eq!(stats.epsilon, 0.1);

    let err = session
        .configure_agent(AgentConfig {
            alpha: Some(0.3),
            epsilon: Some(1.5),
            ..AgentConfig::default()
        })
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidHyperparameter { name: "epsilon", .. }
    ));

    // The rejected request must not have applied its valid half either.
    let stats = session.agent_stats().unwrap();
    assert_eq!(stats.alpha, 0.1);
    assert_eq!(stats.epsilon, 0.1);
}

#[test]
fn manual_steps_run_the_learning_pipeline() {
    let mut session = Session::new().with_seed(9);
    session.create(3, &[]).unwrap();

    let update = session.manual_step(Some(Action::East)).unwrap();
    assert_eq!(update.action, Action::East);
    assert_eq!(update.reward, -1.0);
    assert_eq!(update.state.taxi, Position::new(1, 0));
    assert_eq!(update.step, 1);

    let update = session.manual_step(Some(Action::West)).unwrap();
    assert_eq!(update.reward, -1.0);
    let update = session.manual_step(Some(Action::West)).unwrap();
    assert_eq!(update.reward, -5.0, "bumping the wall costs 5");
    assert_eq!(update.step, 3);

    // Every step feeds the Bellman update, so entries accumulate.
    assert!(session.agent_stats().unwrap().q_table_size >= 1);

    // Auto mode defers to the agent and still returns a full snapshot.
    let update = session.manual_step(None).unwrap();
    assert_eq!(update.state.grid_size, 3);
    assert_eq!(update.step, 4);
}

#[test]
fn training_mode_excludes_manual_control() {
    let mut session = Session::new().with_seed(31);
    session.create(3, &[]).unwrap();

    session.start_training(0, 100).unwrap();
    assert_eq!(session.mode(), Mode::Training);

    assert!(matches!(
        session.manual_step(None),
        Err(Error::TrainingInProgress)
    ));
    assert!(matches!(
        session.start_training(5, 100),
        Err(Error::AlreadyTraining)
    ));
    assert!(matches!(
        session.create(3, &[]),
        Err(Error::TrainingInProgress)
    ));
    assert!(matches!(
        session.explain_decision(),
        Err(Error::TrainingInProgress)
    ));

    // Speed changes are allowed mid-training, invalid ones are not.
    assert!(matches!(
        session.set_speed(7),
        Err(Error::InvalidSpeed { speed: 7 })
    ));
    session.set_speed(10).unwrap();

    session.stop_training().unwrap();
    wait_for_manual_mode(&session);

    assert!(session.manual_step(None).is_ok());
    assert!(matches!(session.stop_training(), Err(Error::NotTraining)));
}

#[test]
fn reset_clears_history_but_can_keep_the_table() {
    let mut session = Session::new().with_seed(41);
    session.create(3, &[]).unwrap();

    session.start_training(3, 100).unwrap();
    session.wait().unwrap();

    let stats = session.training_stats();
    assert_eq!(stats.episodes_completed, 3);
    let table_before = session.agent_stats().unwrap().q_table_size;
    assert!(table_before > 0);

    let snapshot = session.reset(false).unwrap();
    assert_eq!(snapshot.steps, 0);
    assert_eq!(snapshot.total_reward, 0.0);
    assert_eq!(session.training_stats().episodes_completed, 0);
    assert_eq!(
        session.agent_stats().unwrap().q_table_size,
        table_before,
        "reset without reset_agent must keep the learned table"
    );

    session.reset(true).unwrap();
    assert_eq!(session.agent_stats().unwrap().q_table_size, 0);
}

#[test]
fn reset_during_training_stops_the_loop_first() {
    let mut session = Session::new().with_seed(47);
    session.create(4, &[Position::new(2, 2)]).unwrap();

    session.start_training(0, 100).unwrap();
    std::thread::sleep(Duration::from_millis(30));

    session.reset(false).unwrap();
    assert_eq!(session.mode(), Mode::ManualReady);
    assert!(session.manual_step(None).is_ok());
}

#[test]
fn training_loop_emits_the_full_event_sequence() {
    let mut session = Session::new().with_seed(53);
    session.create(3, &[]).unwrap();

    let (observer, rx) = ChannelObserver::channel();
    session.subscribe(Box::new(observer));

    session.start_training(2, 100).unwrap();
    session.wait().unwrap();

    let events: Vec<TrainingEvent> = rx.try_iter().collect();
    assert!(!events.is_empty());

    let mut episode_starts = 0;
    let mut steps = 0;
    let mut episode_completes = 0;
    let mut training_completes = 0;
    for event in &events {
        match event {
            TrainingEvent::EpisodeStart { state, .. } => {
                episode_starts += 1;
                assert_eq!(state.steps, 0, "episode starts from a reset state");
            }
            TrainingEvent::StepUpdate(update) => {
                steps += 1;
                assert_eq!(update.state.grid_size, 3);
                assert!(update.step <= 200);
            }
            TrainingEvent::EpisodeComplete(summary) => {
                episode_completes += 1;
                assert_eq!(summary.episode, episode_completes);
            }
            TrainingEvent::TrainingComplete(summary) => {
                training_completes += 1;
                assert_eq!(summary.episodes_completed, 2);
            }
        }
    }
    assert_eq!(episode_starts, 2);
    assert_eq!(episode_completes, 2);
    assert_eq!(training_completes, 1);
    assert!(steps >= 2);
    assert!(
        matches!(events.last(), Some(TrainingEvent::TrainingComplete(_))),
        "training-complete must be the final event"
    );
}

#[test]
fn query_operations_do_not_mutate() {
    let mut session = Session::new().with_seed(61);
    session.create(3, &[]).unwrap();
    session.manual_step(Some(Action::East)).unwrap();

    let before = session.state().unwrap();
    let values = session.q_values(None).unwrap();
    assert_eq!(values.len(), 6);
    let table = session.full_table().unwrap();
    assert_eq!(table.len(), session.agent_stats().unwrap().q_table_size);
    assert_eq!(session.state().unwrap(), before);
}
