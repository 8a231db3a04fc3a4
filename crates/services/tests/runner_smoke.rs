use std::sync::Arc;
use std::time::Duration;

use lesson_core::model::{Interaction, LessonConfig, LessonSettings, WrongAction};
use lesson_core::quiz::QuizPhase;
use lesson_core::time::fixed_clock;
use services::testing::{Effect, EffectLog, RecordingPlayback, RecordingPresenter};
use services::{EngineOptions, LessonEvent, LessonRunner};
use storage::repository::{InMemorySessionStore, cmi};

fn config() -> LessonConfig {
    let settings = LessonSettings::default()
        .with_time_limit_secs(2)
        .with_require_correct(true)
        .with_wrong_action(WrongAction::Retry);
    let interaction = Interaction::new(
        "q1",
        1.0,
        "Which valve closes first?",
        vec!["inlet".into(), "outlet".into()],
        0,
        None,
    )
    .unwrap();
    LessonConfig::new("Runner smoke", settings, vec![interaction]).unwrap()
}

#[tokio::test(start_paused = true)]
async fn runner_drives_countdown_retry_and_answer() {
    let store = InMemorySessionStore::new();
    let log = EffectLog::new();
    let (runner, handle) = LessonRunner::new(
        Some(config()),
        Box::new(RecordingPlayback::new(log.clone())),
        Box::new(RecordingPresenter::new(log.clone())),
        Arc::new(store.clone()),
        fixed_clock(),
        EngineOptions::default(),
    );
    let task = tokio::spawn(runner.run());

    handle.position_advanced(1.0).unwrap();
    tokio::time::sleep(Duration::from_millis(2_100)).await;
    assert!(log.contains(&Effect::Feedback {
        correct: false,
        timed_out: true,
        explanation: None,
    }));

    tokio::time::sleep(Duration::from_millis(400)).await;
    handle.submit_answer(0).unwrap();
    handle.send(LessonEvent::Continue).unwrap();
    handle.shutdown().unwrap();

    let engine = task.await.unwrap();
    assert_eq!(engine.phase(), QuizPhase::Idle);
    assert_eq!(engine.state().score(), 1);
    assert!(log.contains(&Effect::Resume));
    assert_eq!(store.value(cmi::LESSON_STATUS).as_deref(), Some("passed"));
    assert!(handle.shutdown().is_err());
}
