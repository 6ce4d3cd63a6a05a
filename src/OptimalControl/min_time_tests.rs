#[cfg(test)]
mod tests {
    use crate::NLP::NLPError;
    use crate::NLP::interior_point::SolverSettings;
    use crate::NLP::symbolic_problem::NLProblem;
    use crate::OptimalControl::analytic::{BangBangReference, frictionless_min_time};
    use crate::OptimalControl::driver::{OutputConfig, run_pipeline, solve_task, sweep_friction};
    use crate::OptimalControl::min_time_model::MinTimeModel;
    use crate::OptimalControl::min_time_task::{MinTimeTask, OCPError};
    use crate::OptimalControl::task_file::{ProblemFile, create_template, run};
    use crate::Utils::plots::{PlotError, Renderer};
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    /// remembers every call instead of starting a plotting program
    struct RecordingRenderer {
        calls: RefCell<Vec<PathBuf>>,
        fail: bool,
    }

    impl RecordingRenderer {
        fn new(fail: bool) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                fail,
            }
        }
    }

    impl Renderer for RecordingRenderer {
        fn render(&self, data_file: &Path) -> Result<(), PlotError> {
            self.calls.borrow_mut().push(data_file.to_path_buf());
            if self.fail {
                return Err(PlotError::ProgramFailed {
                    program: "mock".to_string(),
                    status: "exit status: 1".to_string(),
                });
            }
            Ok(())
        }
    }

    fn small_task(n: usize, r: f64) -> MinTimeTask {
        MinTimeTask::new(n, 5.0, 1.0, -3.0, r, 10.0)
    }

    fn output_in(dir: &Path) -> OutputConfig {
        OutputConfig {
            results_file: dir.join("results.txt").display().to_string(),
            plot_script: dir.join("plot.gnu").display().to_string(),
            plot_image: dir.join("plot.png").display().to_string(),
            plot: false,
            ..OutputConfig::default()
        }
    }

    ///////////////////////////////VALIDATION//////////////////////////////////
    #[test]
    fn test_default_task_is_valid() {
        let task = MinTimeTask::default();
        assert_eq!(task.N, 100);
        assert_relative_eq!(task.L, 5.0);
        assert!(task.validate().is_ok());
        assert_relative_eq!(task.h_init(), 0.1);
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let task = MinTimeTask {
            N: 0,
            ..MinTimeTask::default()
        };
        match task.validate() {
            Err(OCPError::InvalidConfiguration(msg)) => assert!(msg.contains("N")),
            other => panic!("expected InvalidConfiguration, got {:?}", other),
        }
        assert!(matches!(
            MinTimeModel::build(&task),
            Err(OCPError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_initial_time_rejected() {
        let task = MinTimeTask {
            tf_init: 0.0,
            ..MinTimeTask::default()
        };
        match task.validate() {
            Err(OCPError::InvalidConfiguration(msg)) => assert!(msg.contains("tf_init")),
            other => panic!("expected InvalidConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_other_invalid_parameters() {
        let base = MinTimeTask::default();
        let invalid = vec![
            MinTimeTask { L: 0.0, ..base },
            MinTimeTask { L: f64::NAN, ..base },
            MinTimeTask { R: -0.1, ..base },
            MinTimeTask { aL: 2.0, ..base },
            MinTimeTask { aU: -3.0, ..base },
            MinTimeTask {
                aU: f64::INFINITY,
                ..base
            },
            MinTimeTask {
                tf_init: -1.0,
                ..base
            },
        ];
        for task in invalid {
            assert!(
                matches!(task.validate(), Err(OCPError::InvalidConfiguration(_))),
                "task {:?} should be rejected",
                task
            );
        }
        // bounds not containing zero are only a warning
        let shifted = MinTimeTask {
            aL: 0.5,
            aU: 2.0,
            ..base
        };
        assert!(shifted.validate().is_ok());
    }

    ///////////////////////////////MODEL//////////////////////////////////
    #[test]
    fn test_model_dimensions_and_initial_guess() {
        let task = MinTimeTask::new(4, 2.0, 1.0, -1.0, 0.0, 4.0);
        let model = MinTimeModel::build(&task).unwrap();
        assert_eq!(model.n_variables(), 3 * 4 + 4);
        assert_eq!(model.n_constraints(), 2 * 4 + 4);
        assert_eq!(model.tf_index(), 0);
        assert_eq!(model.x_index(0), Some(1));
        assert_eq!(model.v_index(0), Some(6));
        assert_eq!(model.a_index(4), Some(15));
        assert_eq!(model.a_index(5), None);

        let guess = &model.nlp.initial_guess;
        assert_relative_eq!(guess[0], 4.0);
        for i in 0..=4 {
            assert_relative_eq!(guess[model.x_index(i).unwrap()], 2.0 * i as f64 / 4.0);
            assert_relative_eq!(guess[model.v_index(i).unwrap()], 0.5);
            assert_relative_eq!(guess[model.a_index(i).unwrap()], 0.0);
        }
        let a2 = model.a_index(2).unwrap();
        assert_relative_eq!(model.nlp.lower_bounds[a2], -1.0);
        assert_relative_eq!(model.nlp.upper_bounds[a2], 1.0);
        assert_relative_eq!(model.nlp.lower_bounds[0], 0.0);
        assert!(model.nlp.upper_bounds[0].is_infinite());
    }

    #[test]
    fn test_constraints_vanish_on_discrete_trajectory() {
        // integrate the implicit Euler scheme exactly and check that every dynamic row is zero
        let n = 4;
        let task = MinTimeTask::new(n, 5.0, 1.0, -3.0, 0.5, 2.0);
        let model = MinTimeModel::build(&task).unwrap();
        let problem = model.nlp.compile().unwrap();

        let tf = 2.0;
        let h = tf / n as f64;
        let controls = [0.0, 1.0, 0.5, -0.2, -0.3];
        let mut x = vec![0.0; n + 1];
        let mut v = vec![0.0; n + 1];
        for i in 1..=n {
            // h*R*v^2 + v - (v_prev + h*a) = 0
            let c = v[i - 1] + h * controls[i];
            let q = h * task.R;
            let discriminant = 1.0 + 4.0 * q * c;
            assert!(discriminant >= 0.0, "no real velocity at node {}", i);
            v[i] = (-1.0 + discriminant.sqrt()) / (2.0 * q);
            x[i] = x[i - 1] + h * v[i];
        }
        let mut z = DVector::zeros(model.n_variables());
        z[model.tf_index()] = tf;
        for i in 0..=n {
            z[model.x_index(i).unwrap()] = x[i];
            z[model.v_index(i).unwrap()] = v[i];
            z[model.a_index(i).unwrap()] = controls[i];
        }
        let c = problem.constraints(&z);
        assert_eq!(c.len(), 2 * n + 4);
        assert!(c.iter().all(|value| value.is_finite()));
        for row in 0..2 * n {
            assert_relative_eq!(c[row], 0.0, epsilon = 1e-12);
        }
        assert_relative_eq!(c[2 * n], 0.0);
        assert_relative_eq!(c[2 * n + 1], x[n] - 5.0, epsilon = 1e-12);
        assert_relative_eq!(c[2 * n + 3], v[n], epsilon = 1e-12);

        let jacobian = problem.jacobian(&z);
        let rate = n as f64 / tf;
        let (x1, v1) = (model.x_index(1).unwrap(), model.v_index(1).unwrap());
        // position row of the first interval: (x1 - x0)*N/tf - v1
        assert_relative_eq!(jacobian[(0, x1)], rate, epsilon = 1e-12);
        assert_relative_eq!(jacobian[(0, model.x_index(0).unwrap())], -rate, epsilon = 1e-12);
        assert_relative_eq!(jacobian[(0, v1)], -1.0, epsilon = 1e-12);
        assert_relative_eq!(
            jacobian[(0, 0)],
            -(x[1] - x[0]) * n as f64 / (tf * tf),
            epsilon = 1e-12
        );
        // velocity row of the second interval: (v2 - v1)*N/tf - a2 + R*v2^2
        let v2 = model.v_index(2).unwrap();
        assert_relative_eq!(
            jacobian[(3, v2)],
            rate + 2.0 * task.R * v[2],
            epsilon = 1e-12
        );
        assert_relative_eq!(jacobian[(3, v1)], -rate, epsilon = 1e-12);
        assert_relative_eq!(jacobian[(3, model.a_index(2).unwrap())], -1.0, epsilon = 1e-12);
        assert_relative_eq!(
            jacobian[(3, 0)],
            -(v[2] - v[1]) * n as f64 / (tf * tf),
            epsilon = 1e-12
        );
        assert_relative_eq!(problem.objective(&z), tf);
    }

    ///////////////////////////////SOLUTIONS//////////////////////////////////
    #[test]
    fn test_frictionless_bang_bang() {
        let task = MinTimeTask::default();
        let trajectory = solve_task(&task, &SolverSettings::default()).unwrap();
        let reference = frictionless_min_time(task.L, task.aU, task.aL).unwrap();
        assert_relative_eq!(reference.tf, 3.6515, epsilon = 1e-4);

        assert!(trajectory.tf > 0.0 && trajectory.tf.is_finite());
        assert_relative_eq!(trajectory.tf, reference.tf, max_relative = 0.02);
        assert_eq!(trajectory.x.len(), task.N + 1);

        // full thrust up to the switching time, full braking after it; one node may sit on the switch
        let h = trajectory.tf / task.N as f64;
        let mut off_profile = Vec::new();
        for i in 1..=task.N {
            let t = trajectory.time[i];
            let expected = if t <= reference.switching_time {
                task.aU
            } else {
                task.aL
            };
            if (trajectory.a[i] - expected).abs() > 1e-3 {
                off_profile.push(i);
            }
        }
        assert!(
            off_profile.len() <= 1,
            "nodes {:?} leave the bang-bang profile",
            off_profile
        );
        for i in &off_profile {
            assert!((trajectory.time[*i] - reference.switching_time).abs() <= h);
        }
        let switching = trajectory.switching_time().unwrap();
        assert_relative_eq!(switching, reference.switching_time, epsilon = 0.1);
        for (i, t) in trajectory.time.iter().enumerate() {
            assert!((trajectory.v[i] - reference.velocity(*t)).abs() < 0.1);
        }

        let quality = trajectory.quality(&task);
        assert!(quality.max_position_defect < 1e-5);
        assert!(quality.max_velocity_defect < 1e-5);
        assert!(quality.max_boundary_error < 1e-6);
        assert!(quality.max_bound_violation == 0.0);
    }

    #[test]
    fn test_converges_from_any_initial_time() {
        // tf of the N = 30 grid for R = 0, 0.5, 1, 5
        let expected = [(0.0, 3.654192), (0.5, 4.796590), (1.0, 5.937086), (5.0, 11.838690)];
        for (r, tf_expected) in expected {
            for tf_init in [0.5, 1.0, 3.0, 10.0, 30.0] {
                let task = MinTimeTask::new(30, 5.0, 1.0, -3.0, r, tf_init);
                let trajectory = match solve_task(&task, &SolverSettings::default()) {
                    Ok(trajectory) => trajectory,
                    Err(e) => panic!("R = {}, tf_init = {}: {}", r, tf_init, e),
                };
                assert_relative_eq!(trajectory.tf, tf_expected, epsilon = 1e-5);
                assert!(trajectory.quality(&task).is_within(1e-5));
            }
        }
    }

    #[test]
    fn test_friction_solution_properties() {
        let task = small_task(40, 0.2);
        let trajectory = solve_task(&task, &SolverSettings::default()).unwrap();
        let quality = trajectory.quality(&task);
        assert!(quality.is_within(1e-5), "{:?}", quality);
        for a in &trajectory.a {
            assert!(*a >= task.aL && *a <= task.aU);
        }
        assert_relative_eq!(trajectory.x[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(trajectory.x[task.N], task.L, epsilon = 1e-6);
        assert_relative_eq!(trajectory.v[task.N], 0.0, epsilon = 1e-6);
        let frictionless = BangBangReference::from_task(&task).unwrap();
        assert!(trajectory.tf > frictionless.tf);
    }

    #[test]
    fn test_more_friction_takes_longer() {
        let task = small_task(30, 0.0);
        let sweep = sweep_friction(&task, &[0.0, 0.1, 0.3], &SolverSettings::default()).unwrap();
        assert_eq!(sweep.len(), 3);
        for pair in sweep.windows(2) {
            assert!(
                pair[1].1 >= pair[0].1 - 1e-6,
                "tf({}) = {} < tf({}) = {}",
                pair[1].0,
                pair[1].1,
                pair[0].0,
                pair[0].1
            );
        }
    }

    ///////////////////////////////PIPELINE//////////////////////////////////
    #[test]
    fn test_pipeline_writes_rows_then_plots() {
        let dir = tempdir().unwrap();
        let output = output_in(dir.path());
        let renderer = RecordingRenderer::new(false);
        let task = small_task(20, 0.0);
        let trajectory =
            run_pipeline(&task, &SolverSettings::default(), &output, &renderer).unwrap();

        let table = std::fs::read_to_string(&output.results_file).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), task.N + 1);
        for line in &lines {
            assert_eq!(line.len(), 4 * 16 + 3);
            assert_eq!(line.split_whitespace().count(), 4);
        }
        let last: Vec<f64> = lines[task.N]
            .split_whitespace()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_relative_eq!(last[0], trajectory.tf, max_relative = 1e-3);
        assert_relative_eq!(last[1], task.L, max_relative = 1e-3);

        let calls = renderer.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], PathBuf::from(&output.results_file));
    }

    #[test]
    fn test_plot_failure_does_not_fail_run() {
        let dir = tempdir().unwrap();
        let mut output = output_in(dir.path());
        output.csv_file = Some(dir.path().join("results.csv").display().to_string());
        let renderer = RecordingRenderer::new(true);
        let result = run_pipeline(
            &small_task(10, 0.0),
            &SolverSettings::default(),
            &output,
            &renderer,
        );
        assert!(result.is_ok());
        assert_eq!(renderer.calls.borrow().len(), 1);
        assert!(Path::new(&output.results_file).exists());
        let csv = std::fs::read_to_string(dir.path().join("results.csv")).unwrap();
        assert_eq!(csv.lines().count(), 10 + 2);
    }

    #[test]
    fn test_solver_failure_aborts_pipeline() {
        let dir = tempdir().unwrap();
        let output = output_in(dir.path());
        let renderer = RecordingRenderer::new(false);
        let settings = SolverSettings {
            max_iterations: 1,
            ..SolverSettings::default()
        };
        let result = run_pipeline(&small_task(10, 0.0), &settings, &output, &renderer);
        match result {
            Err(OCPError::SolverFailure(NLPError::MaxIterationsExceeded { iterations })) => {
                assert_eq!(iterations, 1)
            }
            // the restoration phase runs with the same iteration limit
            Err(OCPError::SolverFailure(NLPError::RestorationFailed { .. })) => {}
            other => panic!("expected solver failure, got {:?}", other.map(|t| t.tf)),
        }
        assert!(!Path::new(&output.results_file).exists());
        assert!(renderer.calls.borrow().is_empty());
    }

    #[test]
    fn test_invalid_task_aborts_pipeline() {
        let dir = tempdir().unwrap();
        let output = output_in(dir.path());
        let renderer = RecordingRenderer::new(false);
        let task = MinTimeTask {
            N: 0,
            ..MinTimeTask::default()
        };
        let result = run_pipeline(&task, &SolverSettings::default(), &output, &renderer);
        assert!(matches!(result, Err(OCPError::InvalidConfiguration(_))));
        assert!(!Path::new(&output.results_file).exists());
        assert!(renderer.calls.borrow().is_empty());
    }

    ///////////////////////////////REFERENCE//////////////////////////////////
    #[test]
    fn test_closed_form_reference() {
        let reference = frictionless_min_time(5.0, 1.0, -3.0).unwrap();
        assert_relative_eq!(reference.tf, (2.0 * 5.0_f64 * (1.0 + 1.0 / 3.0)).sqrt());
        assert_relative_eq!(
            reference.switching_time + reference.peak_velocity / 3.0,
            reference.tf,
            epsilon = 1e-12
        );
        assert_relative_eq!(reference.position(reference.tf), 5.0, epsilon = 1e-12);
        assert_relative_eq!(reference.velocity(reference.tf), 0.0, epsilon = 1e-12);
        assert_relative_eq!(reference.acceleration(0.1), 1.0);
        assert_relative_eq!(reference.acceleration(reference.tf), -3.0);
        assert!(frictionless_min_time(5.0, 1.0, 0.5).is_err());
        assert!(frictionless_min_time(-5.0, 1.0, -3.0).is_err());
    }

    ///////////////////////////////TASK FILES//////////////////////////////////
    #[test]
    fn test_template_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("task.json");
        create_template(&path).unwrap();
        let loaded = ProblemFile::from_file(&path).unwrap();
        assert_eq!(loaded, ProblemFile::default());
        assert_eq!(loaded.task, MinTimeTask::default());
        assert_eq!(loaded.solver.max_iterations, 500);
    }

    #[test]
    fn test_partial_task_file_uses_defaults() {
        let json = r#"{ "task": { "N": 20, "L": 3.0, "aU": 2.0, "aL": -2.0, "R": 0.1, "tf_init": 5.0 },
                        "solver": { "tolerance": 1e-7 } }"#;
        let problem = ProblemFile::from_json(json).unwrap();
        assert_eq!(problem.task.N, 20);
        assert_relative_eq!(problem.task.R, 0.1);
        assert_relative_eq!(problem.solver.tolerance, 1e-7);
        assert_eq!(problem.solver.max_iterations, 500);
        assert_eq!(problem.output, OutputConfig::default());
        assert_eq!(problem.problem_name, None);
    }

    #[test]
    fn test_broken_task_files() {
        assert!(matches!(
            ProblemFile::from_json("{ \"task\": "),
            Err(OCPError::ParseError(_))
        ));
        // the task section is mandatory
        assert!(matches!(
            ProblemFile::from_json("{ \"solver\": {} }"),
            Err(OCPError::ParseError(_))
        ));
        assert!(matches!(
            ProblemFile::from_file(Path::new("/definitely/not/here/task.json")),
            Err(OCPError::Io(_))
        ));
    }

    #[test]
    fn test_run_from_problem_file() {
        let dir = tempdir().unwrap();
        let mut problem = ProblemFile::from_task(small_task(10, 0.05));
        problem.output = output_in(dir.path());
        let trajectory = run(&problem).unwrap();
        assert!(trajectory.tf > 0.0);
        assert!(Path::new(&problem.output.results_file).exists());

        let invalid = ProblemFile::from_task(MinTimeTask {
            tf_init: 0.0,
            ..MinTimeTask::default()
        });
        assert!(matches!(
            run(&invalid),
            Err(OCPError::InvalidConfiguration(_))
        ));
    }
}
