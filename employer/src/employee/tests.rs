use std::thread;
use std::time::{Duration, Instant};

use super::*;
use crate::testing::{Greeting, Sleepy};

fn sleepy(job: Sleepy) -> JobHandle {
    JobHandle::new(job)
}

/// Polls until the employee leaves `Busy`, without ever blocking in a wait.
fn poll_until_done(employee: &mut dyn Employee) -> WorkState {
    let deadline = Instant::now() + Duration::from_secs(10);
    while employee.work_in_progress() {
        assert!(Instant::now() < deadline, "job did not finish in time");
        thread::sleep(Duration::from_millis(10));
    }
    employee.work_state(false)
}

// Behaviour every employee kind shares; instantiated per kind below.
macro_rules! employee_behaviour {
    ($module:ident, $employee:ty) => {
        mod $module {
            use super::*;

            fn employee() -> $employee {
                <$employee>::new()
            }

            #[test]
            fn test_starts_free() {
                let mut employee = employee();
                assert!(employee.is_free());
                assert_eq!(employee.work_state(false), WorkState::Free);
                assert!(!employee.work_in_progress());
            }

            #[test]
            fn test_work_in_progress_while_running() {
                let mut employee = employee();
                employee.work(sleepy(Sleepy::succeeding(300))).unwrap();
                assert!(!employee.is_free());
                assert!(employee.work_in_progress());
                assert!(!employee.work_completed());
                assert_eq!(poll_until_done(&mut employee), WorkState::Complete);
                assert!(!employee.work_in_progress());
            }

            #[test]
            fn test_completed_job() {
                let mut employee = employee();
                employee.work(sleepy(Sleepy::succeeding(20))).unwrap();
                assert_eq!(employee.wait_for_completion(), WorkState::Complete);
                assert!(employee.work_completed());
                assert!(!employee.work_failed());
            }

            #[test]
            fn test_failed_job() {
                let mut employee = employee();
                employee.work(sleepy(Sleepy::failing(20))).unwrap();
                assert_eq!(poll_until_done(&mut employee), WorkState::Failed);
                assert!(employee.work_failed());
                assert!(!employee.work_completed());
            }

            #[test]
            fn test_panicking_job_fails() {
                let mut employee = employee();
                let job = Sleepy {
                    panic: Some(true),
                    ..Default::default()
                };
                employee.work(sleepy(job)).unwrap();
                assert_eq!(employee.wait_for_completion(), WorkState::Failed);
            }

            #[test]
            fn test_terminal_state_is_cached() {
                let mut employee = employee();
                employee.work(sleepy(Sleepy::succeeding(0))).unwrap();
                assert_eq!(employee.wait_for_completion(), WorkState::Complete);
                // a second reap or join would fail and turn this into Failed
                assert_eq!(employee.wait_for_completion(), WorkState::Complete);
                assert_eq!(employee.work_state(false), WorkState::Complete);
            }

            #[test]
            fn test_busy_employee_rejects_work() {
                let mut employee = employee();
                employee.work(sleepy(Sleepy::succeeding(200))).unwrap();

                let err = employee.work(JobHandle::new(Greeting::default())).unwrap_err();

                assert!(matches!(err, Error::EmployeeBusy));
                assert_eq!(employee.job().unwrap().type_name(), "Sleepy");
                employee.wait_for_completion();
            }

            #[test]
            fn test_free_is_noop_while_busy() {
                let mut employee = employee();
                employee.work(sleepy(Sleepy::succeeding(200))).unwrap();

                employee.free();

                assert!(!employee.is_free());
                assert_eq!(employee.job().unwrap().type_name(), "Sleepy");
                assert_eq!(employee.wait_for_completion(), WorkState::Complete);
            }

            #[test]
            fn test_free_after_completion() {
                let mut employee = employee();
                employee.work(sleepy(Sleepy::succeeding(0))).unwrap();
                employee.wait_for_completion();

                employee.free();

                assert!(employee.is_free());
                assert!(employee.job().is_none());
                assert_eq!(employee.work_state(false), WorkState::Free);
                employee.work(sleepy(Sleepy::succeeding(0))).unwrap();
                assert_eq!(employee.wait_for_completion(), WorkState::Complete);
            }

            #[test]
            fn test_stop_working_fails_the_job() {
                let mut employee = employee();
                employee.work(sleepy(Sleepy::succeeding(5_000))).unwrap();

                let started = Instant::now();
                employee.stop_working();

                assert!(started.elapsed() < Duration::from_secs(4));
                assert!(employee.work_failed());
                employee.free();
                assert!(employee.is_free());
            }

            #[test]
            fn test_stop_working_after_completion_is_noop() {
                let mut employee = employee();
                employee.work(sleepy(Sleepy::succeeding(0))).unwrap();
                employee.wait_for_completion();

                employee.stop_working();

                assert!(employee.work_completed());
            }
        }
    };
}

employee_behaviour!(forking_employee, ForkingEmployee);
employee_behaviour!(threading_employee, ThreadingEmployee);

#[test]
fn test_forked_child_exit_codes() {
    let mut ok = Forked::start(&sleepy(Sleepy::succeeding(0))).unwrap();
    assert_eq!(ok.wait(), Outcome::Completed);

    let mut failing = Forked::start(&sleepy(Sleepy::failing(0))).unwrap();
    assert_eq!(failing.wait(), Outcome::Failed);
}

#[test]
fn test_run_guarded_maps_outcomes() {
    assert_eq!(run_guarded(&sleepy(Sleepy::succeeding(0))), Outcome::Completed);
    assert_eq!(run_guarded(&sleepy(Sleepy::failing(0))), Outcome::Failed);
    let panicking = Sleepy {
        panic: Some(true),
        ..Default::default()
    };
    assert_eq!(run_guarded(&sleepy(panicking)), Outcome::Failed);
    assert_eq!(Outcome::Completed.exit_code(), 0);
    assert_ne!(Outcome::Failed.exit_code(), 0);
}

#[test]
fn test_roster_mixes_kinds() {
    let roster: Vec<Box<dyn Employee>> = vec![
        Box::new(ForkingEmployee::new()),
        Box::new(ThreadingEmployee::new()),
    ];
    let kinds: Vec<_> = roster.iter().map(|employee| employee.kind()).collect();
    assert_eq!(kinds, vec!["forking", "threading"]);
}
