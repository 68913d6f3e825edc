//! End-to-end convergence against a fake HAProxy.

use haproxy_converger::converge::{ConvergeError, ConvergeOutcome, ConvergeState};
use haproxy_converger::files::ReloadOutcome;

mod common;

use common::{
    converger, counting_reload, haproxy_in, reload_count, runtime, stat_csv, FakeStatsSocket,
    TEMPLATE,
};

#[tokio::test]
async fn test_first_converge_reloads_even_when_in_sync() {
    let dir = tempfile::tempdir().unwrap();
    let (reload, counter) = counting_reload(dir.path());
    let converger = converger(haproxy_in(dir.path(), "true", reload));
    let _socket = FakeStatsSocket::start(
        &dir.path().join("haproxy.sock"),
        &stat_csv(&[("web", "web-10.0.0.1:80", "UP")]),
    );
    let mut state = ConvergeState::default();

    let outcome = converger
        .converge(&mut state, &runtime(TEMPLATE, &[("web", &["10.0.0.1:80"])]))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ConvergeOutcome::Reconfigured {
            config_changed: true,
            backup_file: None,
            reload: ReloadOutcome::Reloaded,
        }
    );
    assert!(state.first_converge_done);
    assert_eq!(reload_count(&counter), 1);
    assert_eq!(
        std::fs::read_to_string(converger.haproxy().active_config()).unwrap(),
        "global\n  maxconn 100\n\nbackend web\n  server web-10.0.0.1:80 10.0.0.1:80 check\n"
    );
}

#[tokio::test]
async fn test_repeated_converge_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (reload, counter) = counting_reload(dir.path());
    let converger = converger(haproxy_in(dir.path(), "true", reload));
    let socket = FakeStatsSocket::start(
        &dir.path().join("haproxy.sock"),
        &stat_csv(&[("web", "web-10.0.0.1:80", "UP")]),
    );
    let runtime = runtime(TEMPLATE, &[("web", &["10.0.0.1:80"])]);
    let mut state = ConvergeState::default();

    converger.converge(&mut state, &runtime).await.unwrap();
    let second = converger.converge(&mut state, &runtime).await.unwrap();
    let third = converger.converge(&mut state, &runtime).await.unwrap();

    assert_eq!(second, ConvergeOutcome::UpdatedLive { commands: 0 });
    assert_eq!(third, ConvergeOutcome::UpdatedLive { commands: 0 });
    assert_eq!(reload_count(&counter), 1);
    assert!(socket.received().is_empty());
}

#[tokio::test]
async fn test_server_in_maintenance_is_enabled_live() {
    let dir = tempfile::tempdir().unwrap();
    let (reload, counter) = counting_reload(dir.path());
    let haproxy = haproxy_in(dir.path(), "true", reload);
    let marker = haproxy.marker_file();
    let converger = converger(haproxy);
    let socket = FakeStatsSocket::start(
        &dir.path().join("haproxy.sock"),
        &stat_csv(&[("web", "web-10.0.0.1:80", "UP")]),
    );
    let runtime = runtime(TEMPLATE, &[("web", &["10.0.0.1:80"])]);
    let mut state = ConvergeState::default();
    converger.converge(&mut state, &runtime).await.unwrap();

    socket.set_stat(&stat_csv(&[("web", "web-10.0.0.1:80", "MAINT")]));
    let outcome = converger.converge(&mut state, &runtime).await.unwrap();

    assert_eq!(outcome, ConvergeOutcome::UpdatedLive { commands: 1 });
    let batches = socket.wait_for_batches(1).await;
    assert_eq!(batches, vec!["enable server web/web-10.0.0.1:80\n".to_string()]);
    assert_eq!(
        std::fs::read_to_string(marker).unwrap(),
        "enable server web/web-10.0.0.1:80\n"
    );
    assert_eq!(reload_count(&counter), 1);
}

#[tokio::test]
async fn test_removed_endpoint_is_disabled_without_commit() {
    let dir = tempfile::tempdir().unwrap();
    let (reload, counter) = counting_reload(dir.path());
    let converger = converger(haproxy_in(dir.path(), "true", reload));
    let socket = FakeStatsSocket::start(
        &dir.path().join("haproxy.sock"),
        &stat_csv(&[
            ("web", "web-10.0.0.1:80", "UP"),
            ("web", "web-10.0.0.2:80", "UP"),
        ]),
    );
    let mut state = ConvergeState::default();
    converger
        .converge(
            &mut state,
            &runtime(TEMPLATE, &[("web", &["10.0.0.1:80", "10.0.0.2:80"])]),
        )
        .await
        .unwrap();
    let committed = std::fs::read_to_string(converger.haproxy().active_config()).unwrap();

    let outcome = converger
        .converge(&mut state, &runtime(TEMPLATE, &[("web", &["10.0.0.1:80"])]))
        .await
        .unwrap();

    assert_eq!(outcome, ConvergeOutcome::UpdatedLive { commands: 1 });
    let batches = socket.wait_for_batches(1).await;
    assert_eq!(batches, vec!["disable server web/web-10.0.0.2:80\n".to_string()]);
    assert_eq!(
        std::fs::read_to_string(converger.haproxy().active_config()).unwrap(),
        committed
    );
    assert_eq!(reload_count(&counter), 1);
}

#[tokio::test]
async fn test_new_endpoint_commits_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let (reload, counter) = counting_reload(dir.path());
    let converger = converger(haproxy_in(dir.path(), "true", reload));
    let socket = FakeStatsSocket::start(
        &dir.path().join("haproxy.sock"),
        &stat_csv(&[("web", "web-10.0.0.1:80", "UP")]),
    );
    let mut state = ConvergeState::default();
    converger
        .converge(&mut state, &runtime(TEMPLATE, &[("web", &["10.0.0.1:80"])]))
        .await
        .unwrap();

    let outcome = converger
        .converge(
            &mut state,
            &runtime(TEMPLATE, &[("web", &["10.0.0.1:80", "10.0.0.2:80"])]),
        )
        .await
        .unwrap();

    let ConvergeOutcome::Reconfigured {
        config_changed,
        backup_file,
        reload,
    } = outcome
    else {
        panic!("expected a reconfiguration, got {outcome:?}");
    };
    assert!(config_changed);
    assert_eq!(reload, ReloadOutcome::Reloaded);
    let backup = backup_file.expect("previous configuration should be backed up");
    assert!(std::fs::read_to_string(backup).unwrap().contains("web-10.0.0.1:80"));
    assert_eq!(reload_count(&counter), 2);
    assert!(socket.received().is_empty());
}

#[tokio::test]
async fn test_missing_section_with_unchanged_file_skips_reload() {
    let dir = tempfile::tempdir().unwrap();
    let (reload, counter) = counting_reload(dir.path());
    let converger = converger(haproxy_in(dir.path(), "true", reload));
    let socket = FakeStatsSocket::start(
        &dir.path().join("haproxy.sock"),
        &stat_csv(&[("web", "web-10.0.0.1:80", "UP")]),
    );
    let mut state = ConvergeState::default();
    converger
        .converge(&mut state, &runtime(TEMPLATE, &[("web", &["10.0.0.1:80"])]))
        .await
        .unwrap();

    // Same rendered text, but the running process lost the section.
    socket.set_stat(&stat_csv(&[("api", "api-10.0.1.1:9000", "UP")]));
    let outcome = converger
        .converge(&mut state, &runtime(TEMPLATE, &[("web", &["10.0.0.1:80"])]))
        .await
        .unwrap();

    assert_eq!(outcome, ConvergeOutcome::Unchanged);
    assert_eq!(reload_count(&counter), 1);
}

#[tokio::test]
async fn test_exempt_server_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let (reload, _counter) = counting_reload(dir.path());
    let converger = converger(haproxy_in(dir.path(), "true", reload));
    let socket = FakeStatsSocket::start(
        &dir.path().join("haproxy.sock"),
        &stat_csv(&[
            ("web", "web-10.0.0.1:80", "UP"),
            ("web", "web-nocheck-9.9.9.9:80", "UP"),
        ]),
    );
    let runtime = runtime(TEMPLATE, &[("web", &["10.0.0.1:80"])]);
    let mut state = ConvergeState::default();
    converger.converge(&mut state, &runtime).await.unwrap();

    let outcome = converger.converge(&mut state, &runtime).await.unwrap();

    assert_eq!(outcome, ConvergeOutcome::UpdatedLive { commands: 0 });
    assert!(socket.received().is_empty());
}

#[tokio::test]
async fn test_invalid_configuration_is_never_committed() {
    let dir = tempfile::tempdir().unwrap();
    let (reload, counter) = counting_reload(dir.path());
    let haproxy = haproxy_in(dir.path(), "false", reload);
    std::fs::write(haproxy.active_config(), "previous\n").unwrap();
    let converger = converger(haproxy);
    let mut state = ConvergeState::default();

    let err = converger
        .converge(&mut state, &runtime(TEMPLATE, &[("web", &["10.0.0.1:80"])]))
        .await
        .unwrap_err();

    assert!(matches!(err, ConvergeError::Verify(_)));
    assert!(!err.is_fatal());
    assert_eq!(
        std::fs::read_to_string(converger.haproxy().active_config()).unwrap(),
        "previous\n"
    );
    assert_eq!(reload_count(&counter), 0);
}

#[tokio::test]
async fn test_unreachable_socket_still_reaches_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let (reload, _counter) = counting_reload(dir.path());
    let haproxy = haproxy_in(dir.path(), "true", reload);
    let marker = haproxy.marker_file();
    let converger = converger(haproxy);
    let socket = FakeStatsSocket::start(
        &dir.path().join("haproxy-a.sock"),
        &stat_csv(&[("web", "web-10.0.0.1:80", "UP")]),
    );
    let mut state = ConvergeState::default();
    converger
        .converge(&mut state, &runtime(TEMPLATE, &[("web", &["10.0.0.1:80"])]))
        .await
        .unwrap();

    // A stale socket file nobody listens on.
    std::fs::write(dir.path().join("haproxy-b.sock"), "").unwrap();
    socket.set_stat(&stat_csv(&[("web", "web-10.0.0.1:80", "MAINT")]));
    let err = converger
        .converge(&mut state, &runtime(TEMPLATE, &[("web", &["10.0.0.1:80"])]))
        .await
        .unwrap_err();

    let ConvergeError::Dispatch(dispatch) = &err else {
        panic!("expected a dispatch error, got {err:?}");
    };
    assert_eq!(dispatch.attempted, 2);
    assert_eq!(dispatch.failures.len(), 1);
    assert!(!err.is_fatal());
    assert_eq!(socket.wait_for_batches(1).await.len(), 1);
    assert_eq!(
        std::fs::read_to_string(marker).unwrap(),
        "enable server web/web-10.0.0.1:80\n"
    );
}
