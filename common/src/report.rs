//! Run framing, in the format test harnesses grep sample logs for:
//!
//! ```text
//! &&&& RUNNING tract.sample_classify # sample-classify --datadir data/
//! &&&& PASSED tract.sample_classify # sample-classify --datadir data/
//! ```
use std::fmt;
use std::process::ExitCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestResult {
    Running,
    Passed,
    Failed,
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            TestResult::Running => "RUNNING",
            TestResult::Passed => "PASSED",
            TestResult::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug)]
pub struct TestAtom {
    name: String,
    cmdline: String,
    started: bool,
}

impl TestAtom {
    pub fn define<I, S>(name: impl Into<String>, argv: I) -> TestAtom
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cmdline: Vec<String> = argv.into_iter().map(|s| s.as_ref().to_string()).collect();
        TestAtom { name: name.into(), cmdline: cmdline.join(" "), started: false }
    }

    pub fn line(&self, result: TestResult) -> String {
        format!("&&&& {} {} # {}", result, self.name, self.cmdline)
    }

    pub fn report_start(&mut self) {
        self.started = true;
        info!("{}", self.line(TestResult::Running));
    }

    pub fn report_pass(&self) -> ExitCode {
        debug_assert!(self.started, "reporting a result for a test that was never started");
        info!("{}", self.line(TestResult::Passed));
        ExitCode::SUCCESS
    }

    pub fn report_fail(&self) -> ExitCode {
        debug_assert!(self.started, "reporting a result for a test that was never started");
        error!("{}", self.line(TestResult::Failed));
        ExitCode::FAILURE
    }
}
