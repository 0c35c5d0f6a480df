//! Scheduler scenarios.
//!
//! Context switches are inert on hosted builds, so these tests observe the
//! queue bookkeeping that decides who runs next.

use alloc::vec::Vec;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::config::kernel::{MAX_LEVEL, TASK_TIMER_PERIOD, TASK_TIMER_VALUE};
use crate::error::TinyError;

const BOOTSTRAP: TaskId = 1;
const IDLE: TaskId = 2;

extern "C" fn task_main(_id: u64, _arg: i64) {}

fn queue(tasks: &TaskManager, level: usize) -> Vec<TaskId> {
    tasks.ready_queue(level).collect()
}

fn key_push(ascii: u8) -> Message {
    Message::new(
        MessageKind::KeyPush {
            modifier: 0,
            keycode: 0,
            ascii,
        },
        BOOTSTRAP,
    )
}

#[test]
fn starts_with_bootstrap_and_idle() {
    let tasks = TaskManager::new();

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks.current_level(), MAX_LEVEL);
    assert_eq!(tasks.current_task_id(), BOOTSTRAP);
    assert!(!tasks.level_changed());
    assert_eq!(queue(&tasks, MAX_LEVEL), [BOOTSTRAP]);
    assert_eq!(queue(&tasks, 0), [IDLE]);

    let idle = tasks.task(IDLE).unwrap();
    assert!(idle.running());
    assert_eq!(idle.level(), 0);
    assert_ne!(idle.context().rip, 0);
    tasks.dump_tasks();
}

#[test]
fn new_tasks_sleep_until_woken() {
    let mut tasks = TaskManager::new();
    let a = tasks.new_task().id();
    let b = tasks.new_task().id();

    assert_eq!((a, b), (3, 4));
    let task = tasks.task(a).unwrap();
    assert!(!task.running());
    assert_eq!(task.level(), crate::config::kernel::DEFAULT_LEVEL);
    assert!(queue(&tasks, 1).is_empty());
}

#[test]
fn init_context_passes_id_and_argument() {
    let mut tasks = TaskManager::new();
    let mut task = tasks.new_task();
    let id = task.init_context(task_main, 45).wakeup().id();

    let ctx = tasks.task(id).unwrap().context();
    assert_eq!(ctx.rip, task_main as usize as u64);
    assert_eq!(ctx.rdi, id);
    assert_eq!(ctx.rsi, 45);
    assert_eq!(queue(&tasks, 1), [id]);
}

#[test]
fn round_robin_within_a_level() {
    let mut tasks = TaskManager::new();
    let a = tasks.new_task().wakeup_at(MAX_LEVEL).id();
    let b = tasks.new_task().wakeup_at(MAX_LEVEL).id();

    tasks.switch_task(false);
    assert_eq!(tasks.current_task_id(), a);
    assert_eq!(queue(&tasks, MAX_LEVEL), [a, b, BOOTSTRAP]);

    tasks.switch_task(false);
    tasks.switch_task(false);
    assert_eq!(tasks.current_task_id(), BOOTSTRAP);
    assert_eq!(queue(&tasks, MAX_LEVEL), [BOOTSTRAP, a, b]);
}

#[test]
fn higher_level_wins_the_next_switch() {
    let mut tasks = TaskManager::new();
    let low = tasks.new_task().wakeup_at(1).id();
    tasks.sleep(BOOTSTRAP).unwrap();
    assert_eq!(tasks.current_level(), 1);
    assert_eq!(tasks.current_task_id(), low);

    let high = tasks.new_task().wakeup_at(2).id();
    assert!(tasks.level_changed());
    assert_eq!(tasks.current_task_id(), low);

    tasks.switch_task(false);
    assert_eq!(tasks.current_level(), 2);
    assert_eq!(tasks.current_task_id(), high);
    assert_eq!(queue(&tasks, 1), [low]);
}

#[test]
fn waking_below_the_current_level_changes_nothing() {
    let mut tasks = TaskManager::new();
    let id = tasks.new_task().wakeup_at(2).id();

    assert_eq!(queue(&tasks, 2), [id]);
    assert_eq!(tasks.current_level(), MAX_LEVEL);
    assert!(!tasks.level_changed());

    tasks.switch_task(false);
    assert_eq!(tasks.current_task_id(), BOOTSTRAP);
}

#[test]
fn sleeping_the_only_top_task_falls_back_to_idle() {
    let mut tasks = TaskManager::new();
    tasks.sleep(BOOTSTRAP).unwrap();

    assert_eq!(tasks.current_level(), 0);
    assert_eq!(tasks.current_task_id(), IDLE);
    assert!(!tasks.task(BOOTSTRAP).unwrap().running());
    assert!(queue(&tasks, MAX_LEVEL).is_empty());

    tasks.wakeup(BOOTSTRAP, -1).unwrap();
    assert!(tasks.level_changed());
    assert_eq!(queue(&tasks, MAX_LEVEL), [BOOTSTRAP]);
    tasks.switch_task(false);
    assert_eq!(tasks.current_task_id(), BOOTSTRAP);
}

#[test]
fn sleeping_a_ready_task_removes_it_without_switching() {
    let mut tasks = TaskManager::new();
    let a = tasks.new_task().wakeup_at(MAX_LEVEL).id();
    let b = tasks.new_task().wakeup_at(MAX_LEVEL).id();

    tasks.sleep(a).unwrap();
    assert_eq!(queue(&tasks, MAX_LEVEL), [BOOTSTRAP, b]);
    assert_eq!(tasks.current_task_id(), BOOTSTRAP);

    // already asleep
    tasks.sleep(a).unwrap();
    assert_eq!(queue(&tasks, MAX_LEVEL), [BOOTSTRAP, b]);
}

#[test]
fn wakeup_keeps_the_previous_level_by_default() {
    let mut tasks = TaskManager::new();
    let a = tasks.new_task().wakeup_at(2).id();
    tasks.sleep(a).unwrap();
    assert!(queue(&tasks, 2).is_empty());

    tasks.wakeup(a, -1).unwrap();
    assert_eq!(tasks.task(a).unwrap().level(), 2);
    assert_eq!(queue(&tasks, 2), [a]);
}

#[test]
fn lowering_own_level_forces_a_rescan() {
    let mut tasks = TaskManager::new();
    let mid = tasks.new_task().wakeup_at(2).id();
    assert!(!tasks.level_changed());

    tasks.wakeup(BOOTSTRAP, 1).unwrap();
    assert_eq!(tasks.current_level(), 1);
    assert_eq!(tasks.current_task_id(), BOOTSTRAP);
    assert!(tasks.level_changed());

    tasks.switch_task(false);
    assert_eq!(tasks.current_level(), 2);
    assert_eq!(tasks.current_task_id(), mid);
    assert_eq!(queue(&tasks, 1), [BOOTSTRAP]);
}

#[test]
fn raising_own_level_keeps_running_without_rescan() {
    let mut tasks = TaskManager::new();
    let peer = tasks.new_task().wakeup_at(1).id();
    tasks.wakeup(BOOTSTRAP, 1).unwrap();
    tasks.switch_task(false);
    tasks.switch_task(false);
    assert_eq!(tasks.current_task_id(), BOOTSTRAP);
    assert!(!tasks.level_changed());

    tasks.wakeup(BOOTSTRAP, 2).unwrap();
    assert_eq!(tasks.current_level(), 2);
    assert_eq!(tasks.current_task_id(), BOOTSTRAP);
    assert!(!tasks.level_changed());
    assert_eq!(queue(&tasks, 1), [peer]);
}

#[test]
fn moving_a_ready_task_up_flags_a_rescan() {
    let mut tasks = TaskManager::new();
    let a = tasks.new_task().wakeup_at(1).id();
    tasks.wakeup(BOOTSTRAP, 1).unwrap();
    tasks.switch_task(false);
    assert_eq!(tasks.current_task_id(), a);
    assert!(!tasks.level_changed());

    tasks.wakeup(BOOTSTRAP, 2).unwrap();
    assert_eq!(queue(&tasks, 1), [a]);
    assert_eq!(queue(&tasks, 2), [BOOTSTRAP]);
    assert!(tasks.level_changed());

    tasks.switch_task(false);
    assert_eq!(tasks.current_task_id(), BOOTSTRAP);
}

#[test]
fn any_negative_level_keeps_the_current_one() {
    let mut tasks = TaskManager::new();
    let a = tasks.new_task().wakeup_at(2).id();
    tasks.sleep(a).unwrap();

    tasks.wakeup(a, -7).unwrap();
    assert_eq!(tasks.task(a).unwrap().level(), 2);
    assert_eq!(queue(&tasks, 2), [a]);

    // already running: no level change at all
    tasks.wakeup(BOOTSTRAP, -2).unwrap();
    tasks.wakeup(a, i32::MIN).unwrap();
    assert_eq!(tasks.current_level(), MAX_LEVEL);
    assert_eq!(queue(&tasks, MAX_LEVEL), [BOOTSTRAP]);
    assert_eq!(queue(&tasks, 2), [a]);
    assert!(!tasks.level_changed());
}

#[test]
fn handle_wakeup_caps_the_level() {
    let mut tasks = TaskManager::new();
    let a = tasks.new_task().wakeup_at(MAX_LEVEL + 5).id();

    assert_eq!(tasks.task(a).unwrap().level(), MAX_LEVEL);
    assert_eq!(queue(&tasks, MAX_LEVEL), [BOOTSTRAP, a]);
}

#[test]
#[should_panic(expected = "reinitialised while running")]
fn running_task_cannot_get_a_fresh_context() {
    let mut tasks = TaskManager::new();
    tasks.task_mut(BOOTSTRAP).unwrap().init_context(task_main, 0);
}

#[test]
fn messages_arrive_in_order_and_wake_the_receiver() {
    let mut tasks = TaskManager::new();
    let id = tasks.new_task().id();

    for c in *b"abc" {
        tasks.send_message(id, key_push(c)).unwrap();
    }
    assert!(tasks.task(id).unwrap().running());
    assert_eq!(queue(&tasks, 1), [id]);

    let mut task = tasks.task_mut(id).unwrap();
    let received: Vec<_> = core::iter::from_fn(|| task.receive_message()).collect();
    assert_eq!(received, [key_push(b'a'), key_push(b'b'), key_push(b'c')]);
    assert_eq!(task.receive_message(), None);
}

#[test]
fn handle_send_message_wakes_at_its_own_level() {
    let mut tasks = TaskManager::new();
    let mut task = tasks.new_task();
    task.send_message(Message::new(MessageKind::LayerFinish, BOOTSTRAP));
    let id = task.id();

    assert!(tasks.task(id).unwrap().running());
    assert_eq!(tasks.task(id).unwrap().pending_messages(), 1);
}

#[test]
fn unknown_ids_and_levels_are_rejected() {
    let mut tasks = TaskManager::new();

    assert_eq!(tasks.sleep(99), Err(TinyError::NoSuchTask(99)));
    assert_eq!(tasks.wakeup(99, -1), Err(TinyError::NoSuchTask(99)));
    assert_eq!(
        tasks.send_message(99, key_push(b'x')),
        Err(TinyError::NoSuchTask(99))
    );
    assert_eq!(tasks.task(0).err(), Some(TinyError::NoSuchTask(0)));
    assert_eq!(tasks.wakeup(BOOTSTRAP, 4), Err(TinyError::InvalidLevel(4)));
    assert_eq!(tasks.current_level(), MAX_LEVEL);
}

#[test]
fn timers_fire_in_deadline_order() {
    let mut s = Scheduler::new();
    s.timers.add_timer(Timer::new(5, 9));
    s.timers.add_timer(Timer::new(3, 7));
    s.timers.add_timer(Timer::new(3, 5));

    for _ in 0..2 {
        s.timers.tick(&mut s.tasks);
    }
    assert_eq!(s.tasks.current_task().pending_messages(), 0);

    s.timers.tick(&mut s.tasks);
    s.timers.tick(&mut s.tasks);
    s.timers.tick(&mut s.tasks);

    let mut sink = s.tasks.task_mut(BOOTSTRAP).unwrap();
    let fired: Vec<_> = core::iter::from_fn(|| sink.receive_message()).collect();
    assert_eq!(
        fired,
        [
            Message::timer_timeout(3, 5),
            Message::timer_timeout(3, 7),
            Message::timer_timeout(5, 9),
        ]
    );
    assert!(fired.iter().all(|m| m.src_task == KERNEL_SENDER));
    assert_eq!(s.timers.pending(), 1);
}

#[test]
fn overdue_timer_fires_on_the_next_tick() {
    let mut s = Scheduler::new();
    for _ in 0..10 {
        s.timers.tick(&mut s.tasks);
    }
    s.timers.add_timer(Timer::new(4, 1));

    s.timers.tick(&mut s.tasks);
    let msg = s.tasks.task_mut(BOOTSTRAP).unwrap().receive_message();
    assert_eq!(msg, Some(Message::timer_timeout(4, 1)));
}

#[test]
fn timeout_wakes_a_sleeping_event_sink() {
    let mut s = Scheduler::new();
    s.tasks.sleep(BOOTSTRAP).unwrap();
    s.timers.add_timer(Timer::new(1, 42));

    s.timers.tick(&mut s.tasks);

    assert!(s.tasks.task(BOOTSTRAP).unwrap().running());
    assert!(s.tasks.level_changed());
}

#[test]
fn preemption_fires_every_period() {
    let mut s = Scheduler::new();
    s.start_preemption();

    let fired: Vec<u64> = (0..3 * TASK_TIMER_PERIOD)
        .filter_map(|_| {
            s.timers
                .tick(&mut s.tasks)
                .then(|| s.timers.current_tick())
        })
        .collect();

    assert_eq!(
        fired,
        [TASK_TIMER_PERIOD, 2 * TASK_TIMER_PERIOD, 3 * TASK_TIMER_PERIOD]
    );
    // preemption and sentinel
    assert_eq!(s.timers.pending(), 2);
    assert_eq!(s.tasks.current_task().pending_messages(), 0);
}

#[test]
fn preemption_timer_is_not_delivered_as_a_message() {
    let mut s = Scheduler::new();
    s.timers.add_timer(Timer::new(1, TASK_TIMER_VALUE));

    assert!(s.timers.tick(&mut s.tasks));
    assert_eq!(s.tasks.current_task().pending_messages(), 0);
}

/// Checks the queue invariants that must hold between any two operations.
fn check_invariants(tasks: &TaskManager) {
    let mut seen = Vec::new();
    for level in 0..=MAX_LEVEL {
        for id in tasks.ready_queue(level) {
            let task = tasks.task(id).unwrap();
            assert!(task.running(), "task {id} queued while asleep");
            assert_eq!(task.level(), level, "task {id} queued at the wrong level");
            assert!(!seen.contains(&id), "task {id} queued twice");
            seen.push(id);
        }
    }
    for id in 1..=tasks.len() as TaskId {
        let task = tasks.task(id).unwrap();
        assert_eq!(task.running(), seen.contains(&id), "task {id} running flag");
    }

    assert!(tasks.ready_queue(tasks.current_level()).next().is_some());
    assert!(tasks.ready_queue(0).any(|id| id == IDLE));
    if !tasks.level_changed() {
        for level in tasks.current_level() + 1..=MAX_LEVEL {
            assert!(
                tasks.ready_queue(level).next().is_none(),
                "level {level} is ready above current level {}",
                tasks.current_level()
            );
        }
    }
}

#[test]
fn random_operations_keep_queues_consistent() {
    for seed in [1, 7, 42, 2024] {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut s = Scheduler::new();
        s.start_preemption();

        for _ in 0..2000 {
            // Everything except the idle task.
            let pick = |rng: &mut SmallRng, n: usize| -> TaskId {
                let id = rng.random_range(1..n as TaskId);
                if id >= IDLE { id + 1 } else { id }
            };
            let n = s.tasks.len();

            match rng.random_range(0..7) {
                0 if n < 16 => {
                    s.tasks.new_task().init_context(task_main, 0);
                }
                1 => {
                    let id = pick(&mut rng, n);
                    s.tasks.sleep(id).unwrap();
                }
                2 => {
                    let id = pick(&mut rng, n);
                    let level = rng.random_range(-1..=MAX_LEVEL as i32);
                    s.tasks.wakeup(id, level).unwrap();
                }
                3 => {
                    let id = pick(&mut rng, n);
                    s.tasks.send_message(id, key_push(b'r')).unwrap();
                }
                4 => {
                    let deadline = s.timers.current_tick() + rng.random_range(0..8);
                    s.timers.add_timer(Timer::new(deadline, rng.random_range(0..100)));
                }
                5 => {
                    if s.timers.tick(&mut s.tasks) {
                        s.tasks.switch_task(false);
                    }
                }
                _ => s.tasks.switch_task(false),
            }

            check_invariants(&s.tasks);
            assert!(s.timers.pending() >= 2);
        }
    }
}
