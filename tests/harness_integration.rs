//! End-to-end: both roles on one simulated jig.
//!
//! The DUT and the controller each get their own scheduler over a shared
//! `ManualClock`, a shared `SimWire` standing in for the harness cabling
//! and a back-to-back CAN pair.  Time advances in 10 µs steps, DUT first.

#![cfg(not(target_os = "espidf"))]

use std::cell::RefCell;
use std::rc::Rc;

use testjig::app::controller::{ControllerTasks, Measurements, edge_counters};
use testjig::app::dut::DutTasks;
use testjig::app::ports::{Clock, ReportSink};
use testjig::bus::N2kNode;
use testjig::bus::temperature::TempSource;
use testjig::config::{CONTROLLER, ControllerConfig, DUT, DutConfig};
use testjig::drivers::repeater::ChangeFlag;
use testjig::drivers::sim::{ManualClock, SimWire, sim_can_pair};
use testjig::scheduler::Scheduler;
use testjig::sensors::EdgeCounter;
use testjig::verdict::VerdictRecord;

const STEP_US: u64 = 10;

// ── Harness wiring ────────────────────────────────────────────
//
// On the real jig the boards have separate pin spaces; on one SimWire
// every net needs its own number.

const NET_SDA: i32 = 16;
const NET_SCL: i32 = 17;
const NET_DQ: i32 = 4;
/// Controller OPTO_OUT → DUT OPTO_IN.
const NET_OPTO_FWD: i32 = 40;
/// DUT OPTO_OUT → controller OPTO_IN.
const NET_OPTO_BACK: i32 = 41;
const NET_CTL_LED: i32 = 2;
const NET_DUT_LED: i32 = 3;

fn wired() -> (ControllerConfig, DutConfig) {
    let mut c = CONTROLLER;
    c.channels[0].pin = NET_SDA;
    c.channels[1].pin = NET_SCL;
    c.channels[2].pin = NET_DQ;
    c.channels[3].pin = NET_OPTO_BACK;
    c.opto_drive.pin = NET_OPTO_FWD;
    c.heartbeat.pin = NET_CTL_LED;

    let mut d = DUT;
    d.signals[0].pin = NET_SDA;
    d.signals[1].pin = NET_SCL;
    d.signals[2].pin = NET_DQ;
    d.repeater.input_pin = NET_OPTO_FWD;
    d.repeater.output_pin = NET_OPTO_BACK;
    d.heartbeat.pin = NET_DUT_LED;
    (c, d)
}

struct Recorder(Rc<RefCell<Vec<VerdictRecord>>>);

impl ReportSink for Recorder {
    fn report(&mut self, record: &VerdictRecord) {
        self.0.borrow_mut().push(record.clone());
    }
}

/// Run the jig for `seconds` and return every verdict.  With `dut: None`
/// the controller runs against dead cabling.
fn run_jig(controller: ControllerConfig, dut: Option<DutConfig>, seconds: u64) -> Vec<VerdictRecord> {
    let clock = ManualClock::new();
    let wire = SimWire::new();
    let (dut_port, ctl_port) = sim_can_pair();
    let dut_node = RefCell::new(N2kNode::new(dut_port, DUT.bus.address));
    let ctl_node = RefCell::new(N2kNode::new(ctl_port, controller.bus.address));

    let counters: &'static [EdgeCounter; 4] = Box::leak(Box::new(edge_counters(&controller)));
    let flag: &'static ChangeFlag = Box::leak(Box::new(ChangeFlag::new()));
    let measurements = Measurements::new();
    let records = Rc::new(RefCell::new(Vec::new()));

    let mut dut_tasks = dut.map(|d| {
        DutTasks::new(
            &d,
            d.signals.map(|s| wire.output(s.pin)),
            wire.output(d.heartbeat.pin),
            wire.input(d.repeater.input_pin),
            wire.output(d.repeater.output_pin),
            flag,
            &dut_node,
        )
    });
    let mut ctl_tasks = ControllerTasks::new(
        &controller,
        counters,
        &measurements,
        wire.output(controller.opto_drive.pin),
        wire.output(controller.heartbeat.pin),
        &ctl_node,
        Recorder(Rc::clone(&records)),
    )
    .unwrap();

    let mut dut_sched = Scheduler::new(&clock, &wire);
    let mut ctl_sched = Scheduler::new(&clock, &wire);
    if let Some(tasks) = dut_tasks.as_mut() {
        tasks.start(&mut dut_sched).unwrap();
    }
    ctl_tasks.start(&mut ctl_sched).unwrap();

    let end = seconds * 1_000_000;
    while clock.now_us() < end {
        clock.advance(STEP_US);
        dut_sched.tick();
        ctl_sched.tick();
    }

    let out = records.borrow().clone();
    out
}

fn failing_names(record: &VerdictRecord) -> Vec<&'static str> {
    let mut names: Vec<_> = record.failures().map(|c| c.name).collect();
    if let Some(bus) = record.bus.filter(|b| !b.ok) {
        names.push(bus.name);
    }
    names
}

// ── Scenarios ─────────────────────────────────────────────────

#[test]
fn healthy_dut_passes_every_cycle() {
    let (c, d) = wired();
    let records = run_jig(c, Some(d), 3);

    assert_eq!(records.len(), 3);
    for (i, r) in records.iter().enumerate() {
        assert_eq!(r.cycle, i as u32 + 1);
        assert_eq!(r.uptime_secs, i as u64 + 1);
        assert!(r.all_ok, "cycle {} failed: {:?}", r.cycle, failing_names(r));
    }

    let last = &records[2];
    assert_eq!(last.channel("SDA").unwrap().actual, 100);
    assert_eq!(last.channel("SCL").unwrap().actual, 141);
    assert_eq!(last.channel("DQ").unwrap().actual, 173);
    assert_eq!(last.channel("OPTO_IN").unwrap().actual, 217);
    let bus = last.bus.unwrap();
    assert!((bus.actual - (273.15 + 24.5)).abs() < 0.01);
}

#[test]
fn off_frequency_signal_fails_only_its_channel() {
    let (c, mut d) = wired();
    d.signals[1].freq_hz = 160;
    let records = run_jig(c, Some(d), 2);

    for r in &records {
        assert!(!r.all_ok);
        assert_eq!(failing_names(r), ["SCL"]);
        let scl = r.channel("SCL").unwrap();
        assert_eq!(scl.expected, 141);
        assert!((159..=161).contains(&scl.actual), "SCL counted {}", scl.actual);
    }
}

#[test]
fn wrong_temperature_source_reads_as_not_received() {
    let (c, mut d) = wired();
    d.broadcast.source = TempSource::Outside;
    let records = run_jig(c, Some(d), 2);

    for r in &records {
        assert_eq!(failing_names(r), ["CAN bus"]);
        assert_eq!(r.bus.unwrap().actual, 0.0);
    }
}

#[test]
fn out_of_band_temperature_fails() {
    let (c, mut d) = wired();
    d.broadcast.actual_k = 273.15 + 25.0;
    let records = run_jig(c, Some(d), 1);

    assert_eq!(failing_names(&records[0]), ["CAN bus"]);
    assert!((records[0].bus.unwrap().actual - 298.15).abs() < 0.01);
}

#[test]
fn dead_cabling_fails_everything() {
    let (c, _) = wired();
    let records = run_jig(c, None, 2);

    for r in &records {
        assert_eq!(failing_names(r), ["SDA", "SCL", "DQ", "OPTO_IN", "CAN bus"]);
        assert!(r.channels.iter().all(|ch| ch.actual == 0));
    }
}

#[test]
fn broken_repeater_fails_only_opto() {
    let (c, mut d) = wired();
    // Repeater drives a net nobody listens to.
    d.repeater.output_pin = 50;
    let records = run_jig(c, Some(d), 2);

    for r in &records {
        assert_eq!(failing_names(r), ["OPTO_IN"]);
    }
}
