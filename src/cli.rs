//! Minimal CLI: tokenize → parse → print the tree.

use anyhow::Context;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// parse a C-like/shell-like arithmetic expression and print its tree
#[derive(clap::Parser, Debug)]
pub struct CommandLineInterface {
    /// expression text, e.g. '1 + 2 * 3'
    expression: String,

    /// emit the tag-based JSON encoding instead of the s-expression render
    #[arg(long, default_value_t = false)]
    json: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// On success the tree goes to stdout; on failure nothing does — error
    /// reporting and tree output are mutually exclusive.
    pub fn run(&self) -> anyhow::Result<()> {
        let tree = crate::arith::parse(&self.expression)
            .with_context(|| format!("failed to parse {:?}", self.expression))?;
        if self.json {
            let encoded = serde_json::to_string_pretty(&crate::encode::to_json(&tree))
                .context("failed to serialize tree")?;
            println!("{encoded}");
        } else {
            println!("{tree}");
        }
        Ok(())
    }
}
