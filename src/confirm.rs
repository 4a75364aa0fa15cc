use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    KeepDryRun,
    Proceed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmOption {
    pub label: String,
    pub decision: Decision,
}

impl ConfirmOption {
    pub fn new(label: impl Into<String>, decision: Decision) -> Self {
        Self {
            label: label.into(),
            decision,
        }
    }
}

/// Blocks until someone picks one of `options`.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str, options: &[ConfirmOption]) -> io::Result<Decision>;
}

/// Always answers the same way; backs `--yes` and `--dry-run`.
#[derive(Debug, Clone, Copy)]
pub struct Preset(pub Decision);

impl Confirm for Preset {
    fn confirm(&mut self, _prompt: &str, _options: &[ConfirmOption]) -> io::Result<Decision> {
        Ok(self.0)
    }
}

/// Numbered-menu prompt over a line reader. The first option is the default;
/// an empty answer or end of input selects it.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl Prompt<io::StdinLock<'static>, io::Stderr> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, prompt: &str, options: &[ConfirmOption]) -> io::Result<Option<usize>> {
        writeln!(self.output, "{prompt}")?;
        for (idx, option) in options.iter().enumerate() {
            writeln!(self.output, "  [{}] {}", idx + 1, option.label)?;
        }
        write!(self.output, "Choice [1]: ")?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Ok(Some(0));
        }
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(Some(0));
        }
        if let Ok(number) = answer.parse::<usize>()
            && (1..=options.len()).contains(&number)
        {
            return Ok(Some(number - 1));
        }
        let lowered = answer.to_lowercase();
        Ok(options
            .iter()
            .position(|option| option.label.to_lowercase().starts_with(&lowered)))
    }
}

impl<R: BufRead, W: Write> Confirm for Prompt<R, W> {
    fn confirm(&mut self, prompt: &str, options: &[ConfirmOption]) -> io::Result<Decision> {
        if options.is_empty() {
            return Ok(Decision::KeepDryRun);
        }
        loop {
            if let Some(idx) = self.ask(prompt, options)? {
                return Ok(options[idx].decision);
            }
            writeln!(self.output, "Please pick one of the listed options.")?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<ConfirmOption> {
        vec![
            ConfirmOption::new("No (keep dry run only)", Decision::KeepDryRun),
            ConfirmOption::new("Yes, update 3 record(s)", Decision::Proceed),
        ]
    }

    fn answer(input: &str) -> (Decision, String) {
        let mut output = Vec::new();
        let decision = Prompt::new(input.as_bytes(), &mut output)
            .confirm("Proceed with updates now?", &options())
            .expect("prompt");
        (decision, String::from_utf8(output).unwrap())
    }

    #[test]
    fn numbered_answers_select_options() {
        assert_eq!(answer("2\n").0, Decision::Proceed);
        assert_eq!(answer("1\n").0, Decision::KeepDryRun);
    }

    #[test]
    fn label_prefix_selects_option() {
        assert_eq!(answer("yes\n").0, Decision::Proceed);
        assert_eq!(answer("N\n").0, Decision::KeepDryRun);
    }

    #[test]
    fn empty_answer_and_eof_keep_the_dry_run() {
        assert_eq!(answer("\n").0, Decision::KeepDryRun);
        assert_eq!(answer("").0, Decision::KeepDryRun);
    }

    #[test]
    fn invalid_answer_asks_again() {
        let (decision, transcript) = answer("maybe\n2\n");
        assert_eq!(decision, Decision::Proceed);
        assert!(transcript.contains("Please pick one of the listed options."));
        assert_eq!(transcript.matches("Proceed with updates now?").count(), 2);
    }

    #[test]
    fn preset_answers_without_prompting() {
        let mut preset = Preset(Decision::Proceed);
        assert_eq!(preset.confirm("ignored", &options()).unwrap(), Decision::Proceed);
    }
}
