//! Terminal implementation of the cleanup [`Operator`].

use crate::cleanup::{Operator, Selection, SelectionRequest};
use crate::error::{Result, SyncError};
use crate::tooling::format::format_candidates;
use dialoguer::{Confirm, Input};

#[derive(Debug, Default)]
pub struct TerminalOperator;

impl Operator for TerminalOperator {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| SyncError::Prompt(e.to_string()))
    }

    fn select(
        &mut self,
        request: &SelectionRequest,
        position: usize,
        total: usize,
    ) -> Result<Selection> {
        print!("{}", format_candidates(request, position, total));
        loop {
            let answer: String = Input::new()
                .with_prompt(
                    "Hit ENTER for default(*), select a number, or hit n to skip this file, or hit N to stop",
                )
                .allow_empty(true)
                .interact_text()
                .map_err(|e| SyncError::Prompt(e.to_string()))?;
            match Selection::parse(&answer, request.candidates.len()) {
                Ok(selection) => return Ok(selection),
                Err(message) => eprintln!("{}", message),
            }
        }
    }
}
