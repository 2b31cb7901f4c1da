use std::{collections::HashMap, time::{Duration, SystemTime}};
use rand::{distr::{Bernoulli, Distribution}, rng, rngs::ThreadRng};
use crate::{constraint::Constraint, core::{ConstraintResult, State, Value}, ranker::Ranker};
use crate::solver::{DfsSolverState, DfsSolverView, StepObserver};

pub struct NullObserver;

impl <V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S>>
StepObserver<V, S, R, C> for NullObserver {
    fn after_step(&mut self, _solver: &dyn DfsSolverView<V, S, R, C>) {}
}

fn short_result<V: Value>(result: &ConstraintResult<V>) -> String {
    match result {
        ConstraintResult::Contradiction(a) => {
            format!("Contradiction({})", a.name())
        },
        ConstraintResult::Certainty(d, a) => {
            format!("Certainty({:?}, {:?}, {})", d.index, d.value, a.name())
        },
        ConstraintResult::Ok => "Ok".to_string(),
    }
}

enum TimerState {
    Init,
    // With the time it was started
    Running(SystemTime),
    // With the duration from start to end
    Ended(Duration),
}

impl TimerState {
    fn new() -> Self { Self::Init }

    fn start(&mut self) {
        if let TimerState::Init = self {
            *self = TimerState::Running(SystemTime::now());
        } else {
            panic!("TimerState cannot be started if not in Init state.")
        }
    }

    fn end(&mut self) {
        if let TimerState::Running(s) = self {
            *self = TimerState::Ended(
                SystemTime::now().duration_since(*s).expect("Time went backwards!")
            );
        } else {
            panic!("TimerState cannot be ended if not in Running state.")
        }
    }

    fn to_duration(&self) -> Duration {
        match self {
            TimerState::Init => Duration::new(0, 0),
            TimerState::Running(s) => SystemTime::now().duration_since(*s).expect("Time went backwards!"),
            TimerState::Ended(d) => *d,
        }
    }
}

#[derive(PartialEq, Clone, Debug)]
pub struct Histogram {
    pub value_counts: HashMap<usize, usize>,
    pub total: i32,
    pub count: i32,
    pub max: i32,
    pub max_count: i32,
    pub mean: f32,
    pub median: f32,
}

impl Histogram {
    pub fn from_value_counts(value_to_count: &HashMap<usize, usize>) -> Histogram {
        let mut val_counts = value_to_count.iter().map(|(v, c)| (*v as i32, *c as i32)).collect::<Vec<_>>();
        val_counts.sort();
        let total = val_counts.iter().fold(0, |n, (v, c)| n + v*c);
        let count = val_counts.iter().fold(0, |n, (_, c)| n + c);
        let max = val_counts.iter().fold(0, |n, (v, _)| std::cmp::max(*v, n));
        let max_count = val_counts.iter().fold(0, |n, (_, c)| std::cmp::max(*c, n));
        let mean = (total as f32)/(count as f32);
        let median_lo_index = (count - 1) / 2;
        let median_hi_index = count / 2;
        let mut median_lo = None;
        let mut median_hi = None;
        let mut n = 0;
        for (v, c) in val_counts {
            let next_n = n + c;
            if median_lo.is_none() && median_lo_index < next_n {
                median_lo = Some(v);
            }
            if median_hi.is_none() && median_hi_index < next_n {
                median_hi = Some(v);
            }
            n = next_n;
            if median_lo.is_some() && median_hi.is_some() {
                break;
            }
        }
        let median = (median_lo.unwrap_or(0) as f32 + median_hi.unwrap_or(0) as f32)/2.0;
        Histogram { value_counts: value_to_count.clone(), total, count, max, max_count, mean, median }
    }
}

enum SampleState {
    Never,
    AtEnd,
    EveryN(usize, usize),
    Probability(Bernoulli, ThreadRng),
    Time(Duration, SystemTime),
}

pub struct Sample {
    state: SampleState,
}

impl Sample {
    pub fn never() -> Self {
        Self { state: SampleState::Never }
    }

    pub fn at_end() -> Self {
        Self { state: SampleState::AtEnd }
    }

    pub fn every_n(n: usize) -> Self {
        Self { state: SampleState::EveryN(n, 0) }
    }

    pub fn probability(p: f64) -> Self {
        Self {
            state: SampleState::Probability(Bernoulli::new(p).unwrap(), rng())
        }
    }

    pub fn time(every: Duration) -> Self {
        Self { state: SampleState::Time(every, SystemTime::now()) }
    }

    pub fn sample<V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S>>(
        &mut self, solver: &dyn DfsSolverView<V, S, R, C>,
    ) -> bool {
        match &mut self.state {
            SampleState::Never => false,
            SampleState::AtEnd => {
                solver.is_done()
            },
            SampleState::EveryN(n, count) => {
                *count += 1;
                if count >= n || solver.is_done() {
                    *count = 0;
                    true
                } else {
                    false
                }
            },
            SampleState::Probability(d, rng) => {
                d.sample(rng) || solver.is_done()
            },
            SampleState::Time(duration, last) => {
                let now = SystemTime::now();
                let elapsed = now.duration_since(*last).expect("Time went backwards!");
                if elapsed >= *duration || solver.is_done() {
                    *last = now;
                    true
                } else {
                    false
                }
            },
        }
    }
}

/// Observer that prints periodic progress and accumulates search statistics
/// (advance/backtrack streaks, decision widths, fill levels).
pub struct DbgObserver<V: Value, S: State<V>> {
    timer: TimerState,
    print_sample: Sample,
    stat_sample: Option<Sample>,
    certainty_streak: usize,
    certainty_hist: HashMap<usize, usize>,
    advance_hist: HashMap<usize, usize>,
    width_hist: HashMap<usize, usize>,
    backtrack_hist: HashMap<usize, usize>,
    backtrack_delay_hist: HashMap<usize, usize>,
    filled_hist: HashMap<usize, usize>,
    prev_state: Option<DfsSolverState>,
    streak: usize,
    steps: usize,
    _marker: std::marker::PhantomData<(V, S)>,
}

impl <V: Value, S: State<V>> DbgObserver<V, S> {
    pub fn new() -> Self {
        DbgObserver {
            timer: TimerState::new(),
            print_sample: Sample::every_n(1),
            stat_sample: None,
            certainty_streak: 0,
            certainty_hist: HashMap::new(),
            advance_hist: HashMap::new(),
            width_hist: HashMap::new(),
            backtrack_hist: HashMap::new(),
            backtrack_delay_hist: HashMap::new(),
            filled_hist: HashMap::new(),
            prev_state: None,
            streak: 0,
            steps: 0,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn sample_print(&mut self, sample: Sample) -> &mut Self {
        self.print_sample = sample;
        self
    }

    pub fn sample_stats(&mut self, sample: Sample) -> &mut Self {
        self.stat_sample = Some(sample);
        self
    }

    fn update_stats<R: Ranker<V, S>, C: Constraint<V, S>>(&mut self, solver: &dyn DfsSolverView<V, S, R, C>) {
        match solver.solver_state() {
            DfsSolverState::Advancing(state) => {
                if let Some(DfsSolverState::Advancing(_)) = self.prev_state {
                    self.streak += 1;
                } else {
                    self.streak = 1;
                }
                *self.advance_hist.entry(self.streak).or_default() += 1;
                *self.width_hist.entry(state.possibilities).or_default() += 1;
                if let ConstraintResult::Certainty(_, _) = solver.constraint_result() {
                    self.certainty_streak += 1;
                }
            },
            DfsSolverState::Backtracking(_) => {
                if let Some(DfsSolverState::Backtracking(_)) = self.prev_state {
                    self.streak += 1;
                } else {
                    self.streak = 1;
                }
                *self.backtrack_hist.entry(self.streak).or_default() += 1;
                if self.certainty_streak > 0 {
                    *self.certainty_hist.entry(self.certainty_streak).or_default() += 1;
                    self.certainty_streak = 0
                }
            },
            DfsSolverState::Solved => {
                if self.certainty_streak > 0 {
                    *self.certainty_hist.entry(self.certainty_streak + 1).or_default() += 1;
                    self.certainty_streak = 0;
                }
            },
            _ => {},
        }
        self.prev_state = Some(solver.solver_state());
        if let Some(backtracked_steps) = solver.backtracked_steps() {
            *self.backtrack_delay_hist.entry(backtracked_steps).or_default() += 1;
        }
        let state = solver.state();
        let mut filled = 0;
        for r in 0..state.rows() {
            for c in 0..state.cols() {
                if state.get([r, c]).is_some() {
                    filled += 1;
                }
            }
        }
        *self.filled_hist.entry(filled).or_default() += 1;
        self.steps += 1;
    }

    pub fn dump_stats(&self) {
        print!("Steps: {}\n", self.steps);
        print!("Time elapsed: {}\n", self.timer.to_duration().as_secs_f64());
        let n_decisions = self.width_hist.iter().fold(0, |n, (_, count)| n+count);
        let total_choices = self.width_hist.iter().fold(0, |n, (w, count)| n+w*count);
        print!("Average decision width: {}\n", (total_choices as f64)/(n_decisions as f64));
        for (caption, value_counts) in vec![
            ("Num. choices at each advance", &self.width_hist),
            ("Num. steps with N filled-in cells", &self.filled_hist),
            ("Advance streaks", &self.advance_hist),
            ("Certainty streaks", &self.certainty_hist),
            ("Backtrack streaks", &self.backtrack_hist),
            ("Misstep/backtrack delay", &self.backtrack_delay_hist),
        ] {
            let hist = Histogram::from_value_counts(value_counts);
            print!(
                "{}: E = {:.3}, med = {:.1}, max = {}\n",
                caption, hist.mean, hist.median, hist.max,
            );
        }
    }

    pub fn print<R: Ranker<V, S>, C: Constraint<V, S>>(&self, solver: &dyn DfsSolverView<V, S, R, C>) {
        let state = solver.state();
        if solver.is_initializing() {
            print!(
                "INITIALIZING: {:?}; {} elapsed\n{:?}{:?}{}\n",
                solver.most_recent_action(), self.timer.to_duration().as_secs_f64(),
                state, solver.constraint(),
                short_result(&solver.constraint_result()),
            );
        } else if solver.is_done() {
            if solver.is_valid() {
                print!(
                    "SOLVED: {:?}; {} elapsed\n{:?}{:?}{}\n",
                    solver.most_recent_action(), self.timer.to_duration().as_secs_f64(),
                    state, solver.constraint(),
                    short_result(&solver.constraint_result()),
                );
            } else {
                print!("UNSOLVABLE\n");
            }
        } else {
            print!(
                "STEP: {:?}; {} elapsed\n{:?}{:?}{}\n",
                solver.most_recent_action(), self.timer.to_duration().as_secs_f64(),
                state, solver.constraint(),
                short_result(&solver.constraint_result()),
            );
        }
    }
}

impl <V: Value, S: State<V>, R: Ranker<V, S>, C: Constraint<V, S>>
StepObserver<V, S, R, C> for DbgObserver<V, S> {
    fn after_step(&mut self, solver: &dyn DfsSolverView<V, S, R, C>) {
        if let TimerState::Init = self.timer {
            self.timer.start();
        }
        if solver.is_done() {
            self.timer.end();
        }
        self.update_stats(solver);
        if self.print_sample.sample(solver) {
            self.print(solver);
        }
        if let Some(s) = &mut self.stat_sample {
            if s.sample(solver) {
                self.dump_stats();
            }
        }
    }
}
