/// Receiver of step notifications from the reword engine
///
/// Purely observational: the engine never looks at what a sink does.
pub trait ProgressSink {
    fn on_step(&self, step: &str, detail: Option<&str>);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, Option<&str>),
{
    fn on_step(&self, step: &str, detail: Option<&str>) {
        self(step, detail)
    }
}
