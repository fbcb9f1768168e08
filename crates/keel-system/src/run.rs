//! The control loop itself: gather inputs, tick the controller, actuate,
//! publish, sleep.
//!
//! The loop owns the [`Controller`] exclusively. Everything crossing in or
//! out goes through the attitude share, the config mailbox, the status and
//! alert signals, or the stop flag; nothing else is shared.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant, Timer};
use keel_hardware::{AttitudeShare, FootpadAdc, MotorDriver, RemoteSource};

use crate::controller::{Controller, MotorAction, TickInput};
use crate::mailbox::ConfigMailbox;
use crate::pacing::{LoopPacer, LoopStats};
use crate::status::{AlertSignal, StatusSignal, STATUS_DIVIDER};

// Refresh the driver watchdog well inside typical 1 s driver timeouts.
const WATCHDOG_DIVIDER: u32 = 100;

// Driver-side hold on the last current command, so a single missed tick
// does not cut the motor.
const CURRENT_OFF_DELAY_S: f32 = 0.1;

pub struct LoopIo<'a, M: RawMutex> {
    pub attitude: &'a AttitudeShare,
    pub config: &'a ConfigMailbox<M>,
    pub status: &'a StatusSignal<M>,
    pub alerts: &'a AlertSignal<M>,
    pub stop: &'a AtomicBool,
}

/// Run the balance loop until the stop flag is raised. The final iteration
/// completes its tick, commands the idle brake and returns.
pub async fn run_control_loop<M, D, R, F>(
    mut controller: Controller,
    mut motor: D,
    mut remote: R,
    mut footpads: F,
    io: LoopIo<'_, M>,
) where
    M: RawMutex,
    D: MotorDriver,
    R: RemoteSource,
    F: FootpadAdc,
{
    let mut pacer = LoopPacer::new(controller.frequency_hz());
    let mut stats = LoopStats::default();
    let mut last_start = Instant::now();
    let mut tick_count: u32 = 0;

    motor.set_current_off_delay(CURRENT_OFF_DELAY_S);
    info!("control loop up at {} Hz", controller.frequency_hz());

    loop {
        let start = Instant::now();
        let measured_period_us = (start - last_start).as_micros() as u32;
        last_start = start;

        if let Some(cfg) = io.config.take() {
            controller.apply_config(cfg);
            pacer.set_rate(controller.frequency_hz());
        }

        let (adc1, adc2) = footpads.read();
        let input = TickInput {
            attitude: io.attitude.snapshot(),
            telemetry: motor.telemetry(),
            adc1,
            adc2,
            remote: remote.poll(),
        };

        let out = controller.tick(&input);
        match out.action {
            MotorAction::Idle => {}
            MotorAction::Current(amps) => motor.set_current(amps),
            MotorAction::Brake(amps) => motor.set_brake_current(amps),
        }
        if let Some(beep) = out.beep {
            io.alerts.signal(beep);
        }

        tick_count = tick_count.wrapping_add(1);
        if tick_count % WATCHDOG_DIVIDER == 0 {
            motor.timeout_reset();
        }
        if tick_count % STATUS_DIVIDER == 0 {
            io.status.signal(controller.status());
        }

        if io.stop.load(Ordering::Relaxed) {
            motor.set_brake_current(controller.config().pid.brake_current);
            info!(
                "control loop stopping after {} ticks ({} overruns)",
                stats.ticks, stats.overruns
            );
            return;
        }

        let busy_us = (Instant::now() - start).as_micros() as u32;
        stats.record(busy_us, pacer.period_us());
        let sleep_us = pacer.sleep_us(busy_us, measured_period_us);
        if sleep_us > 0 {
            Timer::after(Duration::from_micros(sleep_us as u64)).await;
        }
    }
}
