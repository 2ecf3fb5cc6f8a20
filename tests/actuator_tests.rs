//! Actuator behaviour through the controller, observed at the output sink.

use room_fx::hal::MockSink;
use room_fx::{Config, Direction, Phase, RoomController};

const TICK: u64 = 20;

fn controller() -> RoomController<MockSink> {
    RoomController::new(&Config::default(), MockSink::new(), 0)
}

fn send(c: &mut RoomController<MockSink>, topic: &str, payload: &str, now: u64) -> String {
    c.handle_message(topic, payload.as_bytes(), now)
        .map(|r| r.payload().as_str().to_string())
        .unwrap_or_default()
}

/// Run `ticks` updates after `now`, returning the new time.
fn run(c: &mut RoomController<MockSink>, mut now: u64, ticks: u32) -> u64 {
    for _ in 0..ticks {
        now += TICK;
        c.update(now, true);
    }
    now
}

#[test]
fn on_then_one_tick_drives_output() {
    let mut c = controller();
    assert_eq!(send(&mut c, "room1/motor1", "ON:50:R", 0), "OK");
    run(&mut c, 0, 1);

    assert!(c.sink().is_enabled(0));
    assert_eq!(c.sink().last_output(0), Some((5, Direction::Right)));
    // motor2 untouched
    assert!(!c.sink().is_enabled(1));
}

#[test]
fn reversal_decelerates_flips_and_accelerates() {
    let mut c = controller();
    send(&mut c, "room1/motor1", "ON:80:L", 0);
    let now = run(&mut c, 0, 16);
    assert_eq!(c.actuator("motor1").unwrap().current_speed(), 80);

    assert_eq!(send(&mut c, "room1/motor1", "DIR:R", now), "OK");
    assert!(matches!(
        c.actuator("motor1").unwrap().phase(),
        Phase::Reversing {
            pending: Direction::Right,
            saved_speed: 80
        }
    ));

    run(&mut c, now, 32);
    let motor = c.actuator("motor1").unwrap();
    assert_eq!(motor.current_speed(), 80);
    assert_eq!(motor.direction(), Direction::Right);

    let history = c.sink().output_history(0);
    let flip = history
        .iter()
        .position(|&(_, dir)| dir == Direction::Right)
        .unwrap();
    // Direction changes only at zero duty
    assert_eq!(history[flip].0, 0);
    assert!(history[..flip].iter().all(|&(_, dir)| dir != Direction::Right));
    assert!(history[flip..].iter().all(|&(_, dir)| dir == Direction::Right));
    assert_eq!(history.last(), Some(&(80, Direction::Right)));
}

#[test]
fn slew_never_exceeds_step() {
    let mut c = controller();
    send(&mut c, "room1/motor1", "ON:100:L", 0);
    let now = run(&mut c, 0, 10);
    send(&mut c, "room1/motor1", "SPEED:15", now);
    let now = run(&mut c, now, 10);
    send(&mut c, "room1/motor1", "ON:90:R", now);
    let now = run(&mut c, now, 30);
    send(&mut c, "room1/motor1", "OFF", now);
    run(&mut c, now, 30);

    let duties = c.sink().duty_history(0);
    assert!(duties.len() > 40);
    for pair in duties.windows(2) {
        assert!(pair[0].abs_diff(pair[1]) <= 5, "jump {:?}", pair);
    }
}

#[test]
fn ramp_tracks_line_and_is_monotone() {
    let mut c = controller();
    send(&mut c, "room1/motor2", "ON:100:L:1000", 0);

    let mut last = 0;
    let mut now = 0;
    while now < 1_000 {
        now += TICK;
        c.update(now, true);
        let speed = c.actuator("motor2").unwrap().current_speed();
        assert_eq!(u64::from(speed), 100 * now / 1_000);
        assert!(speed >= last);
        last = speed;
    }
    assert_eq!(last, 100);
    assert!(matches!(
        c.actuator("motor2").unwrap().phase(),
        Phase::Running(Direction::Left, 100)
    ));
}

#[test]
fn off_decelerates_then_disables() {
    let mut c = controller();
    send(&mut c, "room1/motor1", "ON:30:R", 0);
    let now = run(&mut c, 0, 6);
    assert_eq!(send(&mut c, "room1/motor1", "OFF", now), "OK");

    // Still driving while slowing down
    let now = run(&mut c, now, 3);
    assert_eq!(c.actuator("motor1").unwrap().current_speed(), 15);
    assert!(c.sink().is_enabled(0));

    run(&mut c, now, 3);
    let motor = c.actuator("motor1").unwrap();
    assert_eq!(motor.current_speed(), 0);
    assert!(!motor.is_enabled());
    assert_eq!(motor.direction(), Direction::Stopped);
    assert!(!c.sink().is_enabled(0));
}

#[test]
fn stop_forces_everything_off_immediately() {
    let mut c = controller();
    send(&mut c, "room1/motor1", "ON:80:L", 0);
    send(&mut c, "room1/motor2", "ON:60:R", 0);
    let now = run(&mut c, 0, 20);

    let reply = c.handle_message("room1/STOP", b"", now).unwrap();
    assert_eq!(reply.topic.as_str(), "room1/STOP/feedback");
    assert_eq!(reply.payload().as_str(), "OK");

    assert!(c.all_off());
    for ch in 0..2 {
        assert!(!c.sink().is_enabled(ch));
        assert_eq!(c.sink().last_output(ch), Some((0, Direction::Stopped)));
    }
}

#[test]
fn commands_on_disabled_actuator_are_reported() {
    let mut c = controller();
    assert_eq!(
        send(&mut c, "room1/motor1", "SPEED:40", 0),
        "ERROR: ignored, actuator not enabled"
    );
    assert_eq!(
        send(&mut c, "room1/motor1", "DIR:R", 0),
        "ERROR: ignored, actuator not enabled"
    );
    run(&mut c, 0, 5);
    assert_eq!(c.actuator("motor1").unwrap().current_speed(), 0);
    assert!(!c.sink().is_enabled(0));
}

#[test]
fn speed_change_during_reversal_applies_after_flip() {
    let mut c = controller();
    send(&mut c, "room1/motor1", "ON:40:L", 0);
    let now = run(&mut c, 0, 8);
    send(&mut c, "room1/motor1", "DIR:R", now);
    assert_eq!(send(&mut c, "room1/motor1", "SPEED:20", now), "OK");

    run(&mut c, now, 8 + 4);
    let motor = c.actuator("motor1").unwrap();
    assert_eq!(motor.direction(), Direction::Right);
    assert_eq!(motor.current_speed(), 20);
}
