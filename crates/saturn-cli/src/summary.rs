use console::Style;
use saturn_core::jobs::{Job, JobState};

struct Styles {
    title: Style,
    label: Style,
    done: Style,
    failed: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            done: Style::new().green(),
            failed: Style::new().red().bold(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }

    fn state(&self, state: JobState) -> &Style {
        match state {
            JobState::Done => &self.done,
            JobState::Failed => &self.failed,
            _ => &self.disabled,
        }
    }
}

pub fn print_job_summary<'a>(jobs: impl Iterator<Item = &'a Job>) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Jobs"));
    println!("  {}", s.title.apply_to("\u{2550}\u{2550}\u{2550}\u{2550}"));
    println!();

    for job in jobs {
        let name = job
            .source_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!(
            "  {}{:<24}{}",
            s.label.apply_to(format!("{:<6}", job.id().to_string())),
            name,
            s.state(job.state()).apply_to(job.status_text())
        );
        if let Some(path) = job.output_path() {
            println!("        {}", s.path.apply_to(path.display()));
        }
        if let Some(err) = job.output_error() {
            println!("        {}", s.failed.apply_to(err));
        }
        if let Some(original) = job.retry_of() {
            println!(
                "        {}",
                s.label.apply_to(format!("retry {} of {original}", job.attempt()))
            );
        }
    }
    println!();
}
