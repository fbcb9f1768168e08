//! Per-tick orchestration: sensors in, state machine, setpoint pipeline,
//! PID, current out.

use keel_config::{
    ms_to_ticks, BalanceConfig, DARKRIDE_ROLL_MAX, DARKRIDE_ROLL_MIN, HANDTEST_CURRENT_LIMIT,
    REMOTE_TIMEOUT_MS, STANDSTILL_ERPM,
};
use keel_control::footpad::Footpad;
use keel_control::tilt::{
    atr::Atr, brake::BrakeTilt, input::InputTilt, tiltback::Tiltback, torque::TorqueTilt,
    turn::TurnTilt,
};
use keel_control::{
    can_engage, BalancePid, FaultMonitor, Mode, MotorData, RunState, SetpointAdjustment, State,
    Surge, Traction,
};
use keel_hardware::{AttitudeSample, BeepReason, MotorTelemetry, RemoteInput};
use libm::fabsf;

use crate::status::StatusSnapshot;

/// Everything the loop runner gathered for one tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickInput {
    pub attitude: AttitudeSample,
    pub telemetry: MotorTelemetry,
    pub adc1: f32,
    pub adc2: f32,
    pub remote: RemoteInput,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorAction {
    /// No output at all (disabled / startup / parked).
    Idle,
    Current(f32),
    Brake(f32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickOutput {
    pub action: MotorAction,
    pub beep: Option<BeepReason>,
}

impl TickOutput {
    fn idle() -> Self {
        Self {
            action: MotorAction::Idle,
            beep: None,
        }
    }
}

/// The balance core. Owns every piece of per-ride state; the loop runner
/// owns it exclusively and everything else talks to it through snapshots
/// and the config mailbox.
pub struct Controller {
    cfg: BalanceConfig,
    hz: u16,
    pub state: State,
    motor: MotorData,
    footpad: Footpad,
    faults: FaultMonitor,

    tiltback: Tiltback,
    torque_tilt: TorqueTilt,
    atr: Atr,
    brake_tilt: BrakeTilt,
    turn_tilt: TurnTilt,
    input_tilt: InputTilt,
    surge: Surge,
    traction: Traction,
    pid: BalancePid,

    setpoint: f32,
    last_pitch: f32,
    ticks_since_disengage: u32,
    remote_timeout_ticks: u32,
}

impl Controller {
    pub fn new(mut cfg: BalanceConfig) -> Self {
        cfg.validate();
        let hz = cfg.loop_rate.frequency_hz;
        Self {
            motor: MotorData::new(hz, cfg.torque_tilt.filter_hz),
            faults: FaultMonitor::new(hz),
            remote_timeout_ticks: ms_to_ticks(REMOTE_TIMEOUT_MS, hz),
            cfg,
            hz,
            state: State::new(Mode::Normal),
            footpad: Footpad::default(),
            tiltback: Tiltback::default(),
            torque_tilt: TorqueTilt::default(),
            atr: Atr::default(),
            brake_tilt: BrakeTilt::default(),
            turn_tilt: TurnTilt::default(),
            input_tilt: InputTilt::default(),
            surge: Surge::default(),
            traction: Traction::default(),
            pid: BalancePid::new(),
            setpoint: 0.0,
            last_pitch: 0.0,
            ticks_since_disengage: 0,
        }
    }

    pub fn frequency_hz(&self) -> u16 {
        self.hz
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.cfg
    }

    /// Swap the tunables between ticks. Ride state survives; only the
    /// rate-derived pieces are rebuilt.
    pub fn apply_config(&mut self, mut cfg: BalanceConfig) {
        cfg.validate();
        self.hz = cfg.loop_rate.frequency_hz;
        self.motor.reconfigure(self.hz, cfg.torque_tilt.filter_hz);
        self.faults.set_rate(self.hz);
        self.remote_timeout_ticks = ms_to_ticks(REMOTE_TIMEOUT_MS, self.hz);
        self.cfg = cfg;
        info!("config applied, loop at {} Hz", self.hz);
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.state.mode = mode;
    }

    pub fn disable(&mut self) {
        self.state.disable();
    }

    pub fn enable(&mut self) {
        self.state.enable();
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            run: self.state.run,
            sat: self.state.sat,
            stop_condition: self.state.stop_condition,
            footpad: self.footpad.state,
            wheelslip: self.state.wheelslip,
            darkride: self.state.darkride,
            setpoint: self.setpoint,
            pitch: self.last_pitch,
            current_request: self.pid.output,
            duty_smooth: self.motor.duty_smooth,
        }
    }

    pub fn tick(&mut self, input: &TickInput) -> TickOutput {
        self.motor.update(&input.telemetry);
        self.footpad
            .update(input.adc1, input.adc2, &self.cfg.faults);

        match self.state.run {
            RunState::Disabled => TickOutput::idle(),
            RunState::Startup => {
                if input.attitude.startup_done {
                    self.state.startup_done();
                }
                TickOutput::idle()
            }
            RunState::Ready => self.ready_tick(input),
            RunState::Running => self.running_tick(input),
        }
    }

    /// Pitch/roll in the balance frame. Upside-down, pitch flips and roll
    /// folds toward zero so the normal fault thresholds keep their meaning.
    fn balance_angles(&self, att: &AttitudeSample) -> (f32, f32) {
        if self.state.darkride {
            let roll = if att.roll > 0.0 {
                180.0 - att.roll
            } else {
                -180.0 - att.roll
            };
            (-att.pitch, roll)
        } else {
            (att.pitch, att.roll)
        }
    }

    fn ready_tick(&mut self, input: &TickInput) -> TickOutput {
        self.ticks_since_disengage = self.ticks_since_disengage.saturating_add(1);

        // orientation can only change while off the board; the 100..135 deg
        // roll band is hysteresis so a board on its edge does not flicker
        if self.cfg.faults.darkride_enabled {
            let abs_roll = fabsf(input.attitude.roll);
            if self.state.darkride {
                if abs_roll < DARKRIDE_ROLL_MIN {
                    self.state.darkride = false;
                }
            } else if abs_roll > DARKRIDE_ROLL_MAX {
                self.state.darkride = true;
            }
        }

        let (pitch, roll) = self.balance_angles(&input.attitude);
        self.last_pitch = pitch;

        let engaged =
            self.footpad
                .is_engaged(self.state.mode, self.ticks_since_disengage, &self.cfg);
        if can_engage(engaged, pitch, roll, &self.motor, &self.cfg.startup) {
            // no brake pulse under a rider who just push-started
            self.engage(pitch);
            return TickOutput::idle();
        }

        // idle brake holds the board on a slope; a parked board gets nothing
        if self.motor.abs_erpm > STANDSTILL_ERPM {
            TickOutput {
                action: MotorAction::Brake(self.cfg.pid.brake_current),
                beep: None,
            }
        } else {
            TickOutput::idle()
        }
    }

    /// Fresh ride: every shaper, filter and integrator starts from zero so
    /// nothing carries over from the previous ride.
    fn engage(&mut self, pitch: f32) {
        if !self.state.engage() {
            return;
        }
        self.motor.reset();
        self.faults.reset();
        self.pid
            .reset(&self.cfg.pid, self.cfg.startup.softstart_ramp_s, self.hz);
        self.torque_tilt.reset();
        self.atr.reset();
        self.brake_tilt.reset();
        self.turn_tilt.reset();
        self.input_tilt.reset();
        self.surge.reset();
        self.traction.reset();
        self.tiltback.begin(pitch);
        self.setpoint = pitch;
    }

    fn running_tick(&mut self, input: &TickInput) -> TickOutput {
        let att = &input.attitude;
        let (pitch, roll) = self.balance_angles(att);
        // upside-down the pitch and yaw axes flip with the frame; an
        // unfolded rate term would anti-damp instead of damp
        let (pitch_rate, yaw_rate) = if self.state.darkride {
            (-att.gyro[1], -att.gyro[2])
        } else {
            (att.gyro[1], att.gyro[2])
        };
        self.last_pitch = pitch;

        if self
            .faults
            .check(&mut self.state, &self.footpad, pitch, roll, &self.motor, &self.cfg)
            .is_some()
        {
            self.ticks_since_disengage = 0;
            return TickOutput {
                action: MotorAction::Brake(self.cfg.pid.brake_current),
                beep: None,
            };
        }

        // wheelslip first: it decides whether the shapers update at all.
        // Uses the previous tick's commanded current by construction.
        let slipping = self
            .traction
            .update(&self.motor, self.pid.output, &self.cfg.traction);
        self.state.wheelslip = slipping;

        let mut beep = None;
        if slipping {
            // traction owns the tick: every shaper winds down, the pushback
            // family included, and none steps toward a target while the
            // wheel is free
            let f = self.cfg.traction.decay_factor;
            self.tiltback.winddown(f);
            self.torque_tilt.winddown(f);
            self.atr.winddown(f);
            self.brake_tilt.winddown(f);
            self.turn_tilt.winddown(f);
            self.input_tilt.winddown(f);
            self.surge.winddown(f);
            self.state.sat = SetpointAdjustment::Traction;
        } else {
            let reverse = self.faults.reverse_active();
            let (sat, tb_beep) = self.tiltback.update(&self.motor, reverse, &self.cfg, self.hz);
            self.state.sat = sat;
            beep = tb_beep;
            self.torque_tilt.update(&self.motor, &self.cfg.torque_tilt, self.hz);
            self.atr.update(&self.motor, &self.cfg.atr, self.hz);
            self.brake_tilt.update(
                &self.motor,
                &self.atr,
                self.pid.proportional,
                &self.cfg.brake_tilt,
                self.hz,
            );
            self.turn_tilt
                .update(yaw_rate, &self.motor, &self.atr, &self.cfg.turn_tilt, self.hz);
            let connected = input.remote.connected(self.remote_timeout_ticks);
            beep = beep.or(self
                .input_tilt
                .update(&input.remote, connected, &self.cfg.input_tilt, self.hz));
            beep = beep.or(self.surge.update(&self.motor, &self.cfg.surge, self.hz));
            if self.surge.stage > 0
                && matches!(
                    self.state.sat,
                    SetpointAdjustment::None | SetpointAdjustment::Centering
                )
            {
                self.state.sat = SetpointAdjustment::Surge;
            }
        }

        // the ordered pipeline: this sum IS the ride feel
        self.setpoint = self.tiltback.offset
            + self.torque_tilt.offset
            + self.atr.offset
            + self.brake_tilt.offset
            + self.turn_tilt.offset
            + self.input_tilt.offset
            + self.surge.offset;

        let (mut current, pid_beep) = self.pid.update(
            self.setpoint,
            pitch,
            pitch,
            pitch_rate,
            &self.motor,
            self.state.sat == SetpointAdjustment::ReverseStop,
            &self.cfg.pid,
        );
        beep = beep.or(pid_beep);

        if slipping {
            current = 0.0;
        }
        if self.state.mode == Mode::Handtest {
            current = current.clamp(-HANDTEST_CURRENT_LIMIT, HANDTEST_CURRENT_LIMIT);
        }

        TickOutput {
            action: MotorAction::Current(current),
            beep,
        }
    }
}
