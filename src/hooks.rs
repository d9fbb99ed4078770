//! The hook surface: ten callback points, each returning a control code
//! (spec.md §4.10, §6, §7).
//!
//! Grounded on `original_source/src/types_internal.h`'s `struct hook_info`
//! (one function pointer per callback point) and on the teacher's
//! preference for small, well-documented public enums over bitflags. Only
//! `post_trial` honours `REPEAT`/`REPEAT_ONCE`; every other hook treats
//! them the same as `CONTINUE` (spec.md §4.10: "Only `post_trial` honours
//! REPEAT/REPEAT_ONCE").

use crate::run::RunReport;
use crate::trial::TrialResult;

/// What a hook asks the engine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    /// Proceed normally.
    Continue,
    /// Stop the run or sub-phase cleanly.
    Halt,
    /// Treat as a fatal engine error.
    Error,
    /// Run the same trial again. Only honoured by `post_trial`.
    ///
    /// No internal cap is imposed (spec.md §9's documented hazard): a hook
    /// that always returns `Repeat` loops forever. That is a property of
    /// the hook the caller wrote, not a bug in the engine.
    Repeat,
    /// Run the trial once more, then continue. Only honoured by
    /// `post_trial`.
    RepeatOnce,
}

/// Passed to `pre_run`.
#[derive(Debug, Clone)]
pub struct PreRunInfo<'a> {
    pub name: Option<&'a str>,
    pub trials: usize,
    pub seed: u64,
}

/// Passed to `pre_gen_args`, before any argument slot is allocated.
#[derive(Debug, Clone, Copy)]
pub struct PreGenArgsInfo {
    pub trial_index: u64,
}

/// Passed to `pre_trial`, after arguments are generated, before the
/// property runs.
#[derive(Debug, Clone, Copy)]
pub struct PreTrialInfo {
    pub trial_index: u64,
    pub seed: u64,
}

/// Passed to `post_fork`, running inside the freshly forked child, before
/// the property is invoked (spec.md §4.7).
#[derive(Debug, Clone, Copy)]
pub struct PostForkInfo {
    pub trial_index: u64,
    pub child_pid: i32,
}

/// Passed to `post_trial`, after the property (and any shrinking) has run.
#[derive(Debug, Clone, Copy)]
pub struct PostTrialInfo {
    pub trial_index: u64,
    pub seed: u64,
    pub result: TrialResult,
}

/// Passed to `pre_shrink`, before each shrink candidate is tried.
#[derive(Debug, Clone, Copy)]
pub struct PreShrinkInfo {
    pub trial_index: u64,
    pub shrink_round: u64,
}

/// Passed to `post_shrink_trial`, after one shrink candidate has been
/// tested against the property.
#[derive(Debug, Clone, Copy)]
pub struct PostShrinkTrialInfo {
    pub trial_index: u64,
    pub shrink_round: u64,
    pub accepted: bool,
}

/// Passed to `post_shrink`, once the shrinking loop has terminated.
#[derive(Debug, Clone, Copy)]
pub struct PostShrinkInfo {
    pub trial_index: u64,
    pub total_rounds: u64,
}

/// Passed to `counterexample`, once a minimal failing instance is known.
#[derive(Debug, Clone)]
pub struct CounterexampleInfo<'a> {
    pub name: Option<&'a str>,
    pub trial_index: u64,
    pub seed: u64,
    /// One rendered string per argument slot (via the descriptor's `print`).
    pub arguments: &'a [String],
}

/// Passed to `post_run`, once all trials have completed.
#[derive(Debug, Clone)]
pub struct PostRunInfo<'a> {
    pub name: Option<&'a str>,
    pub report: &'a RunReport,
}

/// The ten hook points a caller may override (spec.md §4.10). Every method
/// has a `CONTINUE`-returning default so a caller implements only the
/// points it cares about.
pub trait Hooks {
    fn pre_run(&mut self, _info: &PreRunInfo<'_>) -> HookAction {
        HookAction::Continue
    }

    fn pre_gen_args(&mut self, _info: &PreGenArgsInfo) -> HookAction {
        HookAction::Continue
    }

    fn pre_trial(&mut self, _info: &PreTrialInfo) -> HookAction {
        HookAction::Continue
    }

    fn post_fork(&mut self, _info: &PostForkInfo) -> HookAction {
        HookAction::Continue
    }

    fn post_trial(&mut self, _info: &PostTrialInfo) -> HookAction {
        HookAction::Continue
    }

    fn pre_shrink(&mut self, _info: &PreShrinkInfo) -> HookAction {
        HookAction::Continue
    }

    fn post_shrink_trial(&mut self, _info: &PostShrinkTrialInfo) -> HookAction {
        HookAction::Continue
    }

    fn post_shrink(&mut self, _info: &PostShrinkInfo) -> HookAction {
        HookAction::Continue
    }

    fn counterexample(&mut self, _info: &CounterexampleInfo<'_>) -> HookAction {
        HookAction::Continue
    }

    fn post_run(&mut self, _info: &PostRunInfo<'_>) -> HookAction {
        HookAction::Continue
    }
}

/// Accumulates consecutive-identical-glyph runs into auto-scaled groups
/// (spec.md §4.10): `.` per pass, `F` per fail, `s` per skip, `d` per dup,
/// `E` per error, wrapping columns at `width`. After 100 consecutive
/// same-kind trials at the current scale, the next group is printed as
/// `(KIND x N).` and the scale multiplies by 10, so a long uniform streak
/// collapses instead of printing thousands of glyphs.
#[derive(Debug, Clone)]
pub struct ProgressPrinter {
    width: usize,
    column: usize,
    streak_glyph: char,
    streak_count: u64,
    streak_scale: u64,
}

impl ProgressPrinter {
    /// `width` is the number of glyph columns before wrapping.
    pub fn new(width: usize) -> Self {
        ProgressPrinter {
            width: width.max(1),
            column: 0,
            streak_glyph: '\0',
            streak_count: 0,
            streak_scale: 1,
        }
    }

    fn glyph_for(result: TrialResult) -> char {
        match result {
            TrialResult::Pass => '.',
            TrialResult::Fail => 'F',
            TrialResult::Skip => 's',
            TrialResult::Duplicate => 'd',
            TrialResult::Error => 'E',
        }
    }

    fn label_for(result: TrialResult) -> &'static str {
        match result {
            TrialResult::Pass => "PASS",
            TrialResult::Fail => "FAIL",
            TrialResult::Skip => "SKIP",
            TrialResult::Duplicate => "DUP",
            TrialResult::Error => "ERROR",
        }
    }

    /// Records one trial's outcome, writing glyphs (or a scaled group
    /// marker) to `out`.
    pub fn record(&mut self, result: TrialResult, out: &mut dyn std::fmt::Write) -> std::fmt::Result {
        let glyph = Self::glyph_for(result);
        if glyph == self.streak_glyph {
            self.streak_count += 1;
        } else {
            self.streak_glyph = glyph;
            self.streak_count = 1;
            self.streak_scale = 1;
        }

        if self.streak_count >= 100 {
            write!(out, "({} x {}).", Self::label_for(result), self.streak_scale * 100)?;
            self.streak_scale = self.streak_scale.saturating_mul(10);
            self.streak_count = 0;
            self.column = 0;
            return Ok(());
        }

        write!(out, "{glyph}")?;
        self.column += 1;
        if self.column >= self.width {
            writeln!(out)?;
            self.column = 0;
        }
        Ok(())
    }
}

impl Default for ProgressPrinter {
    fn default() -> Self {
        Self::new(72)
    }
}

/// The engine's built-in hook set, used whenever a caller supplies none
/// (spec.md §4.10 / §6): prints the `pre_run` banner, per-trial progress
/// glyphs, the counter-example block, and the `post_run` summary, in the
/// exact formats spec.md §6 specifies.
#[derive(Debug, Clone, Default)]
pub struct DefaultHooks {
    progress: ProgressPrinter,
    output: String,
}

impl DefaultHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains everything written so far (tests and callers that don't want
    /// this going to stdout can inspect it instead).
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

impl Hooks for DefaultHooks {
    fn pre_run(&mut self, info: &PreRunInfo<'_>) -> HookAction {
        use std::fmt::Write as _;
        let _ = write!(
            self.output,
            "\n== PROP '{}': {} trials, seed 0x{:016x}\n",
            info.name.unwrap_or(""),
            info.trials,
            info.seed
        );
        HookAction::Continue
    }

    fn post_trial(&mut self, info: &PostTrialInfo) -> HookAction {
        let mut buf = String::new();
        let _ = self.progress.record(info.result, &mut buf);
        self.output.push_str(&buf);
        HookAction::Continue
    }

    fn counterexample(&mut self, info: &CounterexampleInfo<'_>) -> HookAction {
        use std::fmt::Write as _;
        let _ = write!(
            self.output,
            "\n\n -- Counter-Example: {}\n    Trial {}, Seed 0x{:016x}\n",
            info.name.unwrap_or(""),
            info.trial_index,
            info.seed
        );
        for (i, rendered) in info.arguments.iter().enumerate() {
            let _ = write!(self.output, "    Argument {i}:\n{rendered}\n");
        }
        HookAction::Continue
    }

    fn post_run(&mut self, info: &PostRunInfo<'_>) -> HookAction {
        use std::fmt::Write as _;
        let verdict = if info.report.fail > 0 { "FAIL" } else { "PASS" };
        let _ = write!(
            self.output,
            "\n== {} '{}': pass {}, fail {}, skip {}, dup {}\n",
            verdict,
            info.name.unwrap_or(""),
            info.report.pass,
            info.report.fail,
            info.report.skip,
            info.report.dup
        );
        HookAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_printer_emits_one_glyph_per_trial_below_threshold() {
        let mut p = ProgressPrinter::new(72);
        let mut out = String::new();
        for _ in 0..5 {
            p.record(TrialResult::Pass, &mut out).unwrap();
        }
        assert_eq!(out, ".....");
    }

    #[test]
    fn progress_printer_collapses_a_saturated_streak() {
        let mut p = ProgressPrinter::new(1000);
        let mut out = String::new();
        for _ in 0..100 {
            p.record(TrialResult::Pass, &mut out).unwrap();
        }
        assert!(out.ends_with("(PASS x 100)."));
    }

    #[test]
    fn progress_printer_resets_streak_on_a_different_glyph() {
        let mut p = ProgressPrinter::new(1000);
        let mut out = String::new();
        for _ in 0..50 {
            p.record(TrialResult::Pass, &mut out).unwrap();
        }
        p.record(TrialResult::Fail, &mut out).unwrap();
        assert!(out.ends_with('F'));
        assert_eq!(p.streak_count, 1);
        assert_eq!(p.streak_scale, 1);
    }

    #[test]
    fn default_hooks_pre_run_matches_documented_format() {
        let mut hooks = DefaultHooks::new();
        hooks.pre_run(&PreRunInfo {
            name: Some("my_prop"),
            trials: 100,
            seed: 0xabad5eed,
        });
        let out = hooks.take_output();
        assert_eq!(out, "\n== PROP 'my_prop': 100 trials, seed 0x00000000abad5eed\n");
    }
}
