use clap::Parser;
use maze_engine::builder::MapBuilder;
use maze_engine::engine::transition;
use maze_engine::history::HistoryLedger;
use maze_engine::map::MapDefinition;
use maze_engine::rng::Rng;
use maze_engine::state::GameState;
use maze_engine::types::{Action, Button, Direction, GameMode, Vec2, Wall, DIRECTIONS};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    single: bool,
    #[arg(long)]
    size: Option<i32>,
    #[arg(long)]
    layers: Option<usize>,
    #[arg(long)]
    steps: Option<i32>,
    #[arg(long)]
    mode: Option<String>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    size: i32,
    layers: usize,
    mode: GameMode,
    steps: i32,
    seed: u32,
}

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum SimOutcome {
    Won,
    Dead,
    StepLimit,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    size: i32,
    layers: usize,
    mode: GameMode,
    outcome: SimOutcome,
    #[serde(rename = "stepsTaken")]
    steps_taken: u64,
    rejected: u64,
    undos: u64,
    rewinds: u64,
    #[serde(rename = "loopCount")]
    loop_count: i32,
    #[serde(rename = "keysCollected")]
    keys_collected: i32,
    #[serde(rename = "cellsSeen")]
    cells_seen: usize,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    step: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioRunResult {
    #[serde(flatten)]
    result: ScenarioResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
    finished_step: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageSteps")]
    average_steps: u64,
    #[serde(rename = "outcomeCounts")]
    outcome_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    level: String,
    event: String,
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<u64>,
    details: Value,
}

fn main() {
    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli);
    let run_started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(seed_hint, run_started_at_ms));
    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut outcome_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_steps = 0u64;
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        emit_log(
            "info",
            "scenario_started",
            &run_id,
            Some(&scenario.name),
            Some(scenario.seed),
            None,
            json!({
                "size": scenario.size,
                "layers": scenario.layers,
                "mode": scenario.mode,
                "steps": scenario.steps,
            }),
        );
        let scenario_run = run_scenario(&scenario);

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &run_id,
                Some(&scenario.name),
                Some(scenario.seed),
                Some(anomaly.step),
                json!({
                    "message": anomaly.message,
                }),
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        total_steps += scenario_run.result.steps_taken;
        *outcome_counts
            .entry(outcome_key(scenario_run.result.outcome))
            .or_insert(0) += 1;

        emit_log(
            "info",
            "scenario_finished",
            &run_id,
            Some(&scenario.name),
            Some(scenario.seed),
            Some(scenario_run.finished_step),
            json!({
                "outcome": scenario_run.result.outcome,
                "stepsTaken": scenario_run.result.steps_taken,
                "cellsSeen": scenario_run.result.cells_seen,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        println!(
            "{}",
            serde_json::to_string(&scenario_run.result).expect("scenario result should serialize")
        );
        scenario_results.push(scenario_run.result);
    }

    let run_finished_at_ms = now_ms();
    let summary = build_run_summary(
        run_id.clone(),
        run_started_at_ms,
        run_finished_at_ms,
        scenario_results.clone(),
        outcome_counts,
        total_anomalies,
        total_steps,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &run_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &run_id,
        None,
        None,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "averageSteps": summary.average_steps,
            "outcomeCounts": summary.outcome_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn run_scenario(scenario: &Scenario) -> ScenarioRunResult {
    let mut rng = Rng::new(scenario.seed);
    let map = generate_map(scenario, &mut rng);
    let mut ledger = HistoryLedger::new(GameState::initial(&map));
    let _ = ledger.save();

    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut steps_taken = 0u64;
    let mut rejected = 0u64;
    let mut undos = 0u64;
    let mut rewinds = 0u64;
    let mut last_step = 0u64;
    let mut outcome = SimOutcome::StepLimit;

    for step in 1..=scenario.steps as u64 {
        last_step = step;
        {
            let state = ledger.current();
            if state.is_won {
                outcome = SimOutcome::Won;
                break;
            }
            if state.is_dead && !revivable(state, &map) {
                outcome = SimOutcome::Dead;
                break;
            }
        }

        if rng.chance(0.04) {
            if ledger.undo().is_ok() {
                undos += 1;
            }
            continue;
        }
        if rng.chance(0.02) {
            if ledger.rewind().is_ok() {
                rewinds += 1;
            }
            continue;
        }
        if step % 25 == 0 {
            let _ = ledger.save();
        }

        let action = choose_action(&mut rng, ledger.current(), &map);
        let prev_seen = seen_count(ledger.current());
        match transition(ledger.current(), action, &map) {
            Some(next) => {
                for message in collect_state_anomalies(&next, &map, prev_seen) {
                    push_anomaly(
                        &mut anomalies,
                        &mut anomaly_records,
                        &mut anomaly_seen,
                        step,
                        message,
                    );
                }
                ledger.record(next);
                steps_taken += 1;
            }
            None => rejected += 1,
        }
    }

    let final_state = ledger.current();
    if final_state.is_won {
        outcome = SimOutcome::Won;
    } else if final_state.is_dead && !revivable(final_state, &map) {
        outcome = SimOutcome::Dead;
    }

    ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            size: scenario.size,
            layers: scenario.layers,
            mode: scenario.mode,
            outcome,
            steps_taken,
            rejected,
            undos,
            rewinds,
            loop_count: final_state.loop_count,
            keys_collected: final_state.player.keys,
            cells_seen: seen_count(final_state),
            anomalies,
        },
        anomaly_records,
        finished_step: last_step,
    }
}

fn generate_map(scenario: &Scenario, rng: &mut Rng) -> MapDefinition {
    let size = scenario.size;
    let mut builder = MapBuilder::new(size, size);
    builder.game_mode(scenario.mode);
    for _ in 1..scenario.layers {
        builder.add_layer();
    }

    for layer in 0..scenario.layers {
        for y in 0..size {
            for x in 0..size {
                let pos = Vec2::new(x, y);
                if rng.chance(0.18) {
                    let wall = if rng.chance(0.2) {
                        Wall::Glass
                    } else {
                        Wall::Solid
                    };
                    builder.set_wall(layer, pos, Direction::Right, wall);
                }
                if rng.chance(0.18) {
                    builder.set_wall(layer, pos, Direction::Down, Wall::Solid);
                }
            }
        }

        let ghost_count = (size / 6).max(1);
        for _ in 0..ghost_count {
            let pos = random_cell(rng, size);
            // Keep the start room free of ghosts.
            if pos.x >= 3 || pos.y >= 3 {
                builder.add_ghost(layer, pos);
            }
        }
        for _ in 0..2 {
            builder.add_key(layer, random_cell(rng, size));
        }
        builder.set_end(layer, Vec2::new(size - 1, size - 1));
    }

    if rng.chance(0.5) {
        builder.set_wall(
            0,
            Vec2::new(size - 1, size - 2),
            Direction::Down,
            Wall::Locked { required_keys: 1 },
        );
    }
    builder.set_wall(
        0,
        Vec2::new(size / 2, size / 2),
        Direction::Right,
        Wall::LetterDoor {
            letter: 'a',
            is_open: false,
        },
    );
    builder.add_button(
        0,
        Button {
            x: 1,
            y: 2,
            direction: Direction::Down,
            letter: 'a',
        },
    );

    for lower in 0..scenario.layers.saturating_sub(1) {
        builder.add_stair_pair(lower, random_cell(rng, size));
    }
    builder.build()
}

fn random_cell(rng: &mut Rng, size: i32) -> Vec2 {
    Vec2::new(rng.range(0, size - 1), rng.range(0, size - 1))
}

fn choose_action(rng: &mut Rng, state: &GameState, map: &MapDefinition) -> Action {
    if state.is_dead {
        return Action::Revive;
    }
    if map.multi_layer
        && map.stair_at(state.player.layer, state.player.pos()).is_some()
        && rng.chance(0.35)
    {
        return Action::UseStair;
    }
    if map.game_mode == GameMode::DeathLoop && rng.chance(0.01) {
        return Action::Revive;
    }
    if rng.chance(0.02) {
        return Action::PressButton('a');
    }
    Action::Move(DIRECTIONS[rng.pick_index(DIRECTIONS.len())])
}

fn revivable(state: &GameState, map: &MapDefinition) -> bool {
    match map.game_mode {
        GameMode::DeathLoop => true,
        GameMode::Exploration => state.player.hp > 0,
    }
}

fn seen_count(state: &GameState) -> usize {
    state
        .layers
        .iter()
        .map(|layer| {
            layer
                .seen
                .iter()
                .map(|row| row.iter().filter(|seen| **seen).count())
                .sum::<usize>()
        })
        .sum()
}

fn collect_state_anomalies(state: &GameState, map: &MapDefinition, prev_seen: usize) -> Vec<String> {
    let mut anomalies = Vec::new();
    let player_pos = state.player.pos();
    if !map.is_active(state.player.layer, player_pos) {
        anomalies.push(format!(
            "player off the active grid: layer {} ({}, {})",
            state.player.layer, player_pos.x, player_pos.y
        ));
    }
    if !state.current_layer().is_seen(player_pos) {
        anomalies.push(format!(
            "player cell not marked seen: ({}, {})",
            player_pos.x, player_pos.y
        ));
    }

    for (index, layer) in state.layers.iter().enumerate() {
        let mut occupied = HashSet::new();
        for ghost in &layer.ghosts {
            if !occupied.insert(ghost.pos()) {
                anomalies.push(format!(
                    "ghosts stacked on one cell: layer {} ({}, {})",
                    index, ghost.x, ghost.y
                ));
            }
            if !map.is_active(index, ghost.pos()) {
                anomalies.push(format!(
                    "ghost off the active grid: layer {} ({}, {})",
                    index, ghost.x, ghost.y
                ));
            }
        }
    }

    let seen = seen_count(state);
    if seen < prev_seen {
        anomalies.push(format!("seen cell count decreased: {prev_seen} -> {seen}"));
    }

    if state.player.keys < 0 {
        anomalies.push(format!("negative key count: {}", state.player.keys));
    }
    if state.player.hp < 0 {
        anomalies.push(format!("negative hp: {}", state.player.hp));
    }
    if state.player.stamina < 0 {
        anomalies.push(format!("negative stamina: {}", state.player.stamina));
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }));
    let mode = cli
        .mode
        .as_deref()
        .and_then(GameMode::parse)
        .unwrap_or(GameMode::Exploration);

    if cli.single || cli.size.is_some() || cli.layers.is_some() || cli.steps.is_some() {
        let size = clamp_i32(cli.size.unwrap_or(12), 6, 32);
        return vec![Scenario {
            name: format!("custom-{}x{size}", cli.layers.unwrap_or(1)),
            size,
            layers: cli.layers.unwrap_or(1).clamp(1, 4),
            mode,
            steps: clamp_i32(cli.steps.unwrap_or(400), 50, 5000),
            seed,
        }];
    }

    vec![
        Scenario {
            name: "quick-maze-12".to_string(),
            size: 12,
            layers: 1,
            mode: GameMode::Exploration,
            steps: 400,
            seed,
        },
        Scenario {
            name: "tower-loop-16".to_string(),
            size: 16,
            layers: 3,
            mode: GameMode::DeathLoop,
            steps: 800,
            seed: normalize_seed(seed as u64 + 1),
        },
    ]
}

fn clamp_i32(value: i32, min: i32, max: i32) -> i32 {
    value.clamp(min, max)
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    step: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        step,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_run_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    run_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    scenarios: Vec<ScenarioResultLine>,
    outcome_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
    total_steps: u64,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let average_steps = if scenario_count == 0 {
        0
    } else {
        total_steps / scenario_count as u64
    };
    RunSummary {
        run_id,
        started_at_ms,
        finished_at_ms,
        scenario_count,
        anomaly_count,
        average_steps,
        outcome_counts,
        scenarios,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    run_id: &str,
    scenario: Option<&str>,
    seed: Option<u32>,
    step: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        run_id: run_id.to_string(),
        scenario: scenario.map(|value| value.to_string()),
        seed,
        step,
        details,
    };
    eprintln!(
        "{}",
        serde_json::to_string(&log_line).expect("structured log should serialize")
    );
}

fn outcome_key(outcome: SimOutcome) -> String {
    match outcome {
        SimOutcome::Won => "won",
        SimOutcome::Dead => "dead",
        SimOutcome::StepLimit => "step_limit",
    }
    .to_string()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).expect("run summary should serialize");
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_scenario_result(outcome: SimOutcome, steps_taken: u64) -> ScenarioResultLine {
        ScenarioResultLine {
            scenario: "test".to_string(),
            seed: 42,
            size: 12,
            layers: 1,
            mode: GameMode::Exploration,
            outcome,
            steps_taken,
            rejected: 0,
            undos: 0,
            rewinds: 0,
            loop_count: 0,
            keys_collected: 0,
            cells_seen: 0,
            anomalies: Vec::new(),
        }
    }

    fn make_scenario(seed: u32) -> Scenario {
        Scenario {
            name: "test-scenario".to_string(),
            size: 10,
            layers: 2,
            mode: GameMode::DeathLoop,
            steps: 120,
            seed,
        }
    }

    #[test]
    fn default_run_id_contains_seed_and_timestamp() {
        assert_eq!(default_run_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn build_run_summary_calculates_average_steps() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            1,
            2,
            vec![
                make_scenario_result(SimOutcome::StepLimit, 400),
                make_scenario_result(SimOutcome::Won, 200),
            ],
            BTreeMap::from([
                ("step_limit".to_string(), 1usize),
                ("won".to_string(), 1usize),
            ]),
            1,
            600,
        );
        assert_eq!(summary.average_steps, 300);
        assert_eq!(summary.scenario_count, 2);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let target = std::env::temp_dir()
            .join(format!("maze-engine-missing-{now}"))
            .join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            1,
            2,
            vec![make_scenario_result(SimOutcome::StepLimit, 400)],
            BTreeMap::from([("step_limit".to_string(), 1usize)]),
            0,
            400,
        );
        let result = write_summary(&target, &summary);
        assert!(result.is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            10,
            "same anomaly".to_string(),
        );
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            11,
            "same anomaly".to_string(),
        );

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].step, 10);
        assert_eq!(records[1].step, 11);
    }

    #[test]
    fn generated_map_keeps_the_start_room_ghost_free() {
        let scenario = make_scenario(7);
        let mut rng = Rng::new(scenario.seed);
        let map = generate_map(&scenario, &mut rng);
        for ghost in &map.layers[map.start.layer].ghosts {
            assert!(ghost.x >= 3 || ghost.y >= 3);
        }
    }

    #[test]
    fn same_seed_produces_identical_results() {
        let scenario = make_scenario(99);
        let first = run_scenario(&scenario);
        let second = run_scenario(&scenario);
        let first_json = serde_json::to_string(&first.result).expect("serialize");
        let second_json = serde_json::to_string(&second.result).expect("serialize");
        assert_eq!(first_json, second_json);
    }

    #[test]
    fn scenario_run_reports_no_anomalies() {
        let scenario = make_scenario(3);
        let run = run_scenario(&scenario);
        assert!(
            run.anomaly_records.is_empty(),
            "unexpected anomalies: {:?}",
            run.anomaly_records
        );
    }
}
