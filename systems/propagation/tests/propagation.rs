use tilelogic_core::{CellCoord, CheckPhase, Failure, Template, TileKind};
use tilelogic_system_propagation::{
    BatchOrder, Config, Frame, Observer, Phase, Propagation, RowReport,
};

const WIRE: &str = "40 10 50\n00 60 00";
const INVERTER: &str = "40 10 60 20 10 50\n00 60 00 00 60 00";

fn template(grid: &str, truths: &str) -> Template {
    tilelogic_template::parse(&format!(
        "=== Template ===\n{grid}\n=== Truth Table ===\n{truths}\n"
    ))
    .expect("valid template")
}

fn run(template: &Template, row: usize) -> RowReport {
    Propagation::default()
        .run_row(template, row, &mut ())
        .expect("row exists")
}

fn run_with(config: Config, template: &Template, row: usize) -> RowReport {
    Propagation::new(config)
        .run_row(template, row, &mut ())
        .expect("row exists")
}

#[derive(Default)]
struct Recorder {
    started: Vec<usize>,
    phases: Vec<Phase>,
    frames: Vec<(u64, CellCoord)>,
    finished: Vec<RowReport>,
}

impl Observer for Recorder {
    fn row_started(&mut self, row: usize, _template: &Template) {
        self.started.push(row);
    }

    fn phase_entered(&mut self, _row: usize, phase: Phase) {
        self.phases.push(phase);
    }

    fn task_dispatched(&mut self, frame: &Frame<'_>) {
        self.frames.push((frame.tick, frame.task.target.cell()));
    }

    fn row_finished(&mut self, report: &RowReport) {
        self.finished.push(report.clone());
    }
}

#[test]
fn true_input_reaches_the_output_through_a_wire() {
    let template = template(WIRE, "1 = 1");
    let report = run(&template, 0);

    assert_eq!(report.outcome, Ok(()));
    assert_eq!(report.phase, Phase::Passed);
    assert_eq!(report.tasks_dispatched, 3);
    assert_eq!(report.ticks, 1);
    assert_eq!(report.last_active_tick, Some(0));
    assert_eq!(report.power.is_powered(CellCoord::new(2, 0)), Some(true));
    assert_eq!(report.power.is_powered(CellCoord::new(1, 1)), Some(true));
    assert_eq!(report.power.powered_count(), 3);
}

#[test]
fn output_mismatch_fails_during_the_tick_it_settles() {
    let template = template(WIRE, "1 = 0");
    let report = run(&template, 0);

    assert_eq!(
        report.outcome,
        Err(Failure::Logical {
            row: 0,
            cell: CellCoord::new(2, 0),
            tile: TileKind::Output,
            phase: CheckPhase::MidRun { tick: 0 },
            observed: true,
            expected: Some(false),
        })
    );
    assert_eq!(report.phase, Phase::Failed);
    assert_eq!(report.ticks, 0, "failure must stop the clock");
}

#[test]
fn undriven_output_fails_the_final_check() {
    let template = template(WIRE, "0 = 1");
    let report = run(&template, 0);

    assert_eq!(
        report.outcome,
        Err(Failure::Logical {
            row: 0,
            cell: CellCoord::new(2, 0),
            tile: TileKind::Output,
            phase: CheckPhase::Final,
            observed: false,
            expected: Some(true),
        })
    );
    assert_eq!(report.tasks_dispatched, 0);
    assert_eq!(report.last_active_tick, None);
}

#[test]
fn inverter_negates_the_input() {
    let template = template(INVERTER, "1 = 0\n1 = 1\n0 = 1\n0 = 0");

    assert!(run(&template, 0).passed(), "1 = 0 should pass");
    assert_eq!(
        run(&template, 1).outcome,
        Err(Failure::Logical {
            row: 1,
            cell: CellCoord::new(5, 0),
            tile: TileKind::Output,
            phase: CheckPhase::MidRun { tick: 0 },
            observed: false,
            expected: Some(true),
        })
    );
    assert!(run(&template, 2).passed(), "0 = 1 should pass");
    assert!(!run(&template, 3).passed(), "0 = 0 should fail");
}

#[test]
fn inverter_result_does_not_depend_on_batch_order() {
    let template = template(INVERTER, "1 = 0");
    let lifo = Config {
        batch_order: BatchOrder::Lifo,
        ..Config::default()
    };

    let fifo = run(&template, 0);
    let reversed = run_with(lifo, &template, 0);

    assert!(fifo.passed() && reversed.passed());
    assert_eq!(fifo.power, reversed.power);
    assert_eq!(fifo.tasks_dispatched, reversed.tasks_dispatched);
}

#[test]
fn unsupported_wire_is_a_structural_failure() {
    let template = template("40 10 50\n00 00 00", "1 = 1");
    let mut recorder = Recorder::default();
    let report = Propagation::default()
        .run_row(&template, 0, &mut recorder)
        .expect("row exists");

    assert_eq!(
        report.outcome,
        Err(Failure::Structural {
            row: 0,
            cell: CellCoord::new(1, 0),
            tile: TileKind::Wire,
        })
    );
    assert_eq!(recorder.phases, vec![Phase::Preprocessing, Phase::Failed]);
    assert!(recorder.frames.is_empty(), "no task may fire after preprocess fails");
}

#[test]
fn out_of_range_truth_indices_are_structural_failures() {
    let input = template("41 10 50\n00 60 00", "1 = 1");
    let output = template("40 10 51\n00 60 00", "1 = 1");

    assert!(matches!(
        run(&input, 0).outcome,
        Err(Failure::Structural {
            tile: TileKind::Input,
            ..
        })
    ));
    assert!(matches!(
        run(&output, 0).outcome,
        Err(Failure::Structural {
            tile: TileKind::Output,
            ..
        })
    ));
}

#[test]
fn observer_sees_every_dispatched_task_in_order() {
    let template = template(WIRE, "1 = 1");
    let mut recorder = Recorder::default();
    let report = Propagation::default()
        .run_row(&template, 0, &mut recorder)
        .expect("row exists");

    assert_eq!(recorder.started, vec![0]);
    assert_eq!(
        recorder.phases,
        vec![
            Phase::Preprocessing,
            Phase::Propagating,
            Phase::FinalChecking,
            Phase::Passed,
        ]
    );
    assert_eq!(
        recorder.frames,
        vec![
            (0, CellCoord::new(1, 0)),
            (0, CellCoord::new(2, 0)),
            (0, CellCoord::new(1, 1)),
        ]
    );
    assert_eq!(recorder.finished, vec![report]);
}

#[test]
fn wavefront_settles_within_the_manhattan_distance() {
    let wires = 12;
    let grid = format!(
        "40{}{}\n00{}{}",
        " 10".repeat(wires),
        " 50",
        " 60".repeat(wires),
        " 00"
    );
    let template = template(&grid, "1 = 1");
    let report = run(&template, 0);

    let input = CellCoord::new(0, 0);
    let output = CellCoord::new(u32::try_from(wires + 1).expect("small grid"), 0);
    let distance = u64::from(input.manhattan_distance(output));

    assert!(report.passed());
    let settled = report.last_active_tick.expect("tasks were dispatched");
    assert!(
        settled <= distance,
        "settled at tick {settled}, distance {distance}"
    );
}

#[test]
fn missing_rows_are_not_simulated() {
    let template = template(WIRE, "1 = 1");
    let mut recorder = Recorder::default();

    assert!(Propagation::default()
        .run_row(&template, 1, &mut recorder)
        .is_none());
    assert!(recorder.started.is_empty());
}

#[test]
fn empty_grid_passes_vacuously() {
    let template = template("00 00\n00 00", "=");
    let report = run(&template, 0);

    assert!(report.passed());
    assert_eq!(report.ticks, 0);
}
