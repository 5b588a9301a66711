mod common;

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crowd_mtl::data::loader::{ImageDataLoader, LoaderOptions};
use crowd_mtl::layers::Param;
use crowd_mtl::network::StateDict;
use crowd_mtl::optim::Sgd;
use crowd_mtl::report::{Reporter, StepReport, ValidationReport};
use crowd_mtl::telemetry::Telemetry;
use crowd_mtl::train::{Evaluator, Scores, ValidationStage};
use crowd_mtl::{Blob, ClassWeights, CrowdError, Grid, Model, Result, Rngs, TrainConfig, Trainer};

use common::write_dataset;

/// Predicts zeros and reports a scripted loss sequence.
struct ScriptedModel {
    losses: Vec<f64>,
    calls: usize,
    loss: Option<f64>,
    seen_weights: Rc<RefCell<Vec<ClassWeights>>>,
    param: Param,
    step_time: Duration,
}

impl ScriptedModel {
    fn new(losses: Vec<f64>) -> ScriptedModel {
        ScriptedModel {
            losses,
            calls: 0,
            loss: None,
            seen_weights: Rc::default(),
            param: Param::zeros("w", vec![1]),
            step_time: Duration::ZERO,
        }
    }

    fn slow(losses: Vec<f64>, step_time: Duration) -> ScriptedModel {
        ScriptedModel { step_time, ..ScriptedModel::new(losses) }
    }
}

impl Model for ScriptedModel {
    fn forward(&mut self, blob: &Blob, class_weights: &ClassWeights) -> Result<Grid> {
        std::thread::sleep(self.step_time);
        self.seen_weights.borrow_mut().push(class_weights.clone());
        self.loss = Some(self.losses[self.calls % self.losses.len()]);
        self.calls += 1;
        Ok(Grid::zeros(blob.gt_density.rows, blob.gt_density.cols))
    }

    fn loss(&self) -> Option<f64> {
        self.loss
    }

    fn zero_grad(&mut self) {
        self.param.zero_grad();
    }

    fn backward(&mut self) -> Result<()> {
        self.param.grad[0] = 1.0;
        Ok(())
    }

    fn params_mut(&mut self) -> Vec<&mut Param> {
        vec![&mut self.param]
    }

    fn state_dict(&self) -> StateDict {
        StateDict::from_params([&self.param])
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        state.copy_into([&mut self.param])
    }

    fn predict(&mut self, image: &Grid) -> Result<Grid> {
        Ok(Grid::zeros(image.rows, image.cols))
    }
}

#[derive(Clone, Default)]
struct Recorder {
    steps: Rc<RefCell<Vec<StepReport>>>,
    validations: Rc<RefCell<Vec<ValidationReport>>>,
    scalars: Rc<RefCell<Vec<(String, f64, usize)>>>,
}

impl Reporter for Recorder {
    fn step(&mut self, report: &StepReport) {
        self.steps.borrow_mut().push(report.clone());
    }

    fn validation(&mut self, report: &ValidationReport) {
        self.validations.borrow_mut().push(report.clone());
    }
}

impl Telemetry for Recorder {
    fn add_scalar(&mut self, name: &str, value: f64, step: usize) {
        self.scalars.borrow_mut().push((name.to_string(), value, step));
    }
}

/// Returns MAE values from a script, one per call.
struct ScriptedEvaluator {
    maes: Vec<f64>,
    calls: usize,
}

impl Evaluator for ScriptedEvaluator {
    fn evaluate(&mut self, _checkpoint: &Path, _loader: &ImageDataLoader) -> Result<Scores> {
        let mae = self.maes[self.calls];
        self.calls += 1;
        Ok(Scores { mae, mse: mae * 2.0 })
    }
}

fn config(out: &Path, start: usize, end: usize, disp: usize) -> TrainConfig {
    TrainConfig {
        output_dir: out.to_path_buf(),
        start_step: start,
        end_step: end,
        disp_interval: disp,
        log_interval: 1,
        ..TrainConfig::default()
    }
}

fn loader(root: &Path, n: usize) -> ImageDataLoader {
    let counts: Vec<f64> = (0..n).map(|i| (i * 3 + 1) as f64).collect();
    let ds = write_dataset(root, &counts);
    let options = LoaderOptions { num_classes: 4, ..LoaderOptions::default() };
    ImageDataLoader::new(&ds.images, &ds.gt, options).unwrap()
}

#[test]
fn single_epoch_writes_one_checkpoint_and_displays_at_zero_and_two() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader(dir.path(), 3);
    let out = dir.path().join("out");
    let cfg = config(&out, 1, 1, 2);
    let rec = Recorder::default();

    let mut trainer = Trainer::new(&cfg, ScriptedModel::new(vec![0.5]), Sgd::new(0.1, 0.9), Rngs::new(Some(1)))
        .with_reporter(Box::new(rec.clone()));
    let summary = trainer.run(&loader).unwrap();

    assert_eq!(summary.checkpoints, vec![out.join("cmtl_shtechA_1.json")]);
    assert!(out.join("cmtl_shtechA_1.json").is_file());
    assert!(out.join("results.png").is_file());
    assert_eq!(summary.display_events, vec![(1, 0), (1, 2)]);
    assert_eq!(summary.total_steps, 3);

    let steps = rec.steps.borrow();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps.iter().map(|s| s.step).collect::<Vec<_>>(), vec![0, 2]);
    assert_eq!(steps[0].et_count, 0.0);
    assert!(steps.iter().all(|s| s.seconds_per_step >= 0.0));
}

#[test]
fn display_fires_on_every_multiple_in_every_epoch() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader(dir.path(), 5);
    let cfg = config(&dir.path().join("out"), 3, 4, 2);

    let mut trainer = Trainer::new(&cfg, ScriptedModel::new(vec![0.1]), Sgd::new(0.1, 0.0), Rngs::new(Some(2)));
    let summary = trainer.run(&loader).unwrap();

    assert_eq!(summary.display_events, vec![(3, 0), (3, 2), (3, 4), (4, 0), (4, 2), (4, 4)]);
    let epochs: Vec<_> = summary.epochs.iter().map(|e| e.epoch).collect();
    assert_eq!(epochs, vec![3, 4]);
    assert_eq!(summary.checkpoints.len(), 2);
}

#[test]
fn running_loss_resets_each_epoch_and_never_decreases_within_it() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader(dir.path(), 4);
    let cfg = config(&dir.path().join("out"), 1, 3, 1);
    let rec = Recorder::default();

    let losses = vec![0.25, 0.0, 1.5, 0.75];
    let mut trainer = Trainer::new(&cfg, ScriptedModel::new(losses.clone()), Sgd::new(0.1, 0.9), Rngs::new(Some(3)))
        .with_reporter(Box::new(rec.clone()));
    let summary = trainer.run(&loader).unwrap();

    let steps = rec.steps.borrow();
    assert_eq!(steps.len(), 12);
    for epoch in steps.chunks(4) {
        assert_eq!(epoch[0].step, 0);
        assert_eq!(epoch[0].running_loss, losses[0]);
        for pair in epoch.windows(2) {
            assert!(pair[1].running_loss >= pair[0].running_loss);
        }
    }
    for stats in &summary.epochs {
        assert_eq!(stats.steps, 4);
        assert!((stats.train_loss - 2.5).abs() < 1e-12);
        assert!((stats.mean_loss - 0.625).abs() < 1e-12);
    }
}

#[test]
fn class_weights_never_change_during_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader(dir.path(), 4);
    let cfg = config(&dir.path().join("out"), 1, 2, 10);
    let model = ScriptedModel::new(vec![0.5]);
    let seen = Rc::clone(&model.seen_weights);

    let mut trainer = Trainer::new(&cfg, model, Sgd::new(0.1, 0.9), Rngs::new(Some(4)));
    trainer.run(&loader).unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 8);
    for w in seen.iter() {
        let same_bits = w
            .as_slice()
            .iter()
            .zip(loader.classifier_weights().as_slice())
            .all(|(a, b)| a.to_bits() == b.to_bits());
        assert!(same_bits);
    }
}

#[test]
fn non_finite_loss_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader(dir.path(), 3);
    let cfg = config(&dir.path().join("out"), 1, 1, 10);

    let mut trainer = Trainer::new(&cfg, ScriptedModel::new(vec![0.5, f64::NAN]), Sgd::new(0.1, 0.9), Rngs::new(Some(5)));
    match trainer.run(&loader) {
        Err(CrowdError::InvalidLoss { epoch: 1, step: 1, .. }) => {}
        other => panic!("expected invalid loss, got {:?}", other.map(|s| s.total_steps)),
    }
}

#[test]
fn inverted_epoch_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader(dir.path(), 2);
    let cfg = config(&dir.path().join("out"), 4, 2, 10);

    let mut trainer = Trainer::new(&cfg, ScriptedModel::new(vec![0.5]), Sgd::new(0.1, 0.9), Rngs::new(Some(6)));
    assert!(matches!(trainer.run(&loader), Err(CrowdError::Config(_))));
}

#[test]
fn validation_tracks_the_best_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader(dir.path(), 2);
    let cfg = config(&dir.path().join("out"), 1, 4, 10);
    let rec = Recorder::default();

    let evaluator = ScriptedEvaluator { maes: vec![10.0, 8.0], calls: 0 };
    let stage = ValidationStage::new(2, Box::new(evaluator), &loader);
    let mut trainer = Trainer::new(&cfg, ScriptedModel::new(vec![0.5]), Sgd::new(0.1, 0.9), Rngs::new(Some(7)))
        .with_reporter(Box::new(rec.clone()))
        .with_telemetry(Box::new(rec.clone()))
        .with_validation(stage);
    let summary = trainer.run(&loader).unwrap();

    let best = summary.best.unwrap();
    assert_eq!(best.model, "cmtl_shtechA_4.json");
    assert_eq!(best.mae, 8.0);

    let vals: Vec<_> = summary.epochs.iter().map(|e| e.val_mae).collect();
    assert_eq!(vals, vec![None, Some(10.0), None, Some(8.0)]);
    assert_eq!(rec.validations.borrow().len(), 2);

    let scalars = rec.scalars.borrow();
    let named = |n: &str| scalars.iter().filter(|s| s.0 == n).count();
    assert_eq!(named("train_loss_step"), 8);
    assert_eq!(named("MAE"), 2);
    assert_eq!(named("MSE"), 2);
    let train_loss: Vec<_> = scalars.iter().filter(|s| s.0 == "train_loss").collect();
    assert_eq!(train_loss.len(), 2);
    assert!((train_loss[0].1 - 0.5).abs() < 1e-12);
    assert_eq!(train_loss[0].2, 2);
}

#[test]
fn same_seed_reproduces_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader(dir.path(), 5);
    let run = |seed: u64| {
        let cfg = config(&dir.path().join(format!("out{}", seed)), 1, 2, 1);
        let rec = Recorder::default();
        let mut trainer = Trainer::new(&cfg, ScriptedModel::new(vec![0.5]), Sgd::new(0.1, 0.9), Rngs::new(Some(seed)))
            .with_reporter(Box::new(rec.clone()));
        trainer.run(&loader).unwrap();
        let counts: Vec<f64> = rec.steps.borrow().iter().map(|s| s.gt_count).collect();
        counts
    };
    assert_eq!(run(11), run(11));
}

#[test]
fn step_time_counts_steps_carried_over_from_the_previous_epoch() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader(dir.path(), 5);
    let cfg = config(&dir.path().join("out"), 1, 2, 100);
    let rec = Recorder::default();

    let model = ScriptedModel::slow(vec![0.5], Duration::from_millis(20));
    let mut trainer = Trainer::new(&cfg, model, Sgd::new(0.1, 0.9), Rngs::new(Some(8)))
        .with_reporter(Box::new(rec.clone()));
    trainer.run(&loader).unwrap();

    let steps = rec.steps.borrow();
    assert_eq!(steps.iter().map(|s| (s.epoch, s.step)).collect::<Vec<_>>(), vec![(1, 0), (2, 0)]);
    let second = steps[1].seconds_per_step;
    assert!(second >= 0.02, "{}", second);
    assert!(second < 0.04, "{}", second);
}

#[test]
fn log_interval_samples_every_other_step() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader(dir.path(), 5);
    let cfg = TrainConfig { log_interval: 2, ..config(&dir.path().join("out"), 1, 1, 100) };
    let rec = Recorder::default();

    let losses = vec![0.1, 0.2, 0.3, 0.4, 0.5];
    let mut trainer = Trainer::new(&cfg, ScriptedModel::new(losses), Sgd::new(0.1, 0.9), Rngs::new(Some(9)))
        .with_telemetry(Box::new(rec.clone()));
    let summary = trainer.run(&loader).unwrap();
    assert_eq!(summary.total_steps, 5);

    let scalars = rec.scalars.borrow();
    let logged: Vec<(f64, usize)> = scalars
        .iter()
        .filter(|s| s.0 == "train_loss_step")
        .map(|s| (s.1, s.2))
        .collect();
    // steps 0, 2 and 4, indexed by the running step count
    assert_eq!(logged, vec![(0.1, 1), (0.3, 3), (0.5, 5)]);
}
