//! Research proposal composition
//!
//! Builds a markdown proposal document from a winning idea, the research
//! titles returned by the generator, and the retrieved reference links.
//! Composition is local; it makes no network calls.

use crate::pipeline::types::{Idea, ResearchProposal};
use chrono::Utc;

/// Compose a proposal for one idea.
pub fn compose_proposal(
    idea: &Idea,
    research_titles: &[String],
    references: &[String],
) -> ResearchProposal {
    let generated_at = Utc::now();
    let mut doc = String::new();

    doc.push_str(&format!("# Research Proposal: {}\n\n", idea.title));
    doc.push_str(&format!(
        "_Generated: {}_\n\n",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    doc.push_str("## Abstract\n\n");
    doc.push_str(&summarize(&idea.documentation, 3));
    doc.push_str("\n\n");

    doc.push_str("## Introduction\n\n");
    doc.push_str(&format!(
        "This proposal outlines **{}**, approached as follows: {}\n\n",
        idea.title, idea.approach
    ));

    doc.push_str("## Literature Review\n\n");
    if research_titles.is_empty() {
        doc.push_str("No prior work was surveyed for this proposal.\n\n");
    } else {
        for title in research_titles {
            doc.push_str(&format!("- {title}\n"));
        }
        doc.push('\n');
    }

    doc.push_str("## Methodology\n\n");
    doc.push_str(&format!(
        "Proposed technology stack: {}\n\n{}\n\n",
        idea.stack, idea.approach
    ));

    doc.push_str("## Expected Outcomes\n\n");
    doc.push_str("A working prototype demonstrating the core approach, published as a repository with documentation and example usage.\n\n");

    doc.push_str("## Timeline\n\n");
    doc.push_str(
        "| Phase | Weeks | Deliverable |\n\
         |---|---|---|\n\
         | Literature study | 1-2 | Annotated bibliography |\n\
         | Prototype | 3-8 | Core implementation |\n\
         | Evaluation | 9-10 | Benchmark results |\n\
         | Writing | 11-12 | Final report |\n\n",
    );

    doc.push_str("## References\n\n");
    if references.is_empty() {
        doc.push_str("_No references retrieved._\n");
    } else {
        for (i, link) in references.iter().enumerate() {
            doc.push_str(&format!("{}. {}\n", i + 1, link));
        }
    }

    ResearchProposal {
        title: idea.title.clone(),
        markdown: doc,
        references: references.to_vec(),
        generated_at,
    }
}

/// First `n` sentences of a text, used as the abstract.
fn summarize(text: &str, n: usize) -> String {
    let mut out = String::new();
    let mut count = 0;
    for chunk in text.split_inclusive(['.', '!', '?']) {
        out.push_str(chunk);
        count += 1;
        if count >= n {
            break;
        }
    }
    if out.trim().is_empty() {
        "No documentation was provided for this idea.".to_string()
    } else {
        out.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idea() -> Idea {
        Idea {
            title: "Distributed Cache Warmer".into(),
            approach: "Precompute hot keys from access logs.".into(),
            stack: "Rust, Redis".into(),
            documentation: "Warms caches ahead of traffic. Reduces tail latency. Uses log replay. Fourth sentence dropped.".into(),
            code_samples: vec![],
        }
    }

    #[test]
    fn test_proposal_carries_all_sections() {
        let proposal = compose_proposal(
            &idea(),
            &["Cache warming at scale".into()],
            &["https://example.org/paper".into()],
        );

        for section in [
            "## Abstract",
            "## Introduction",
            "## Literature Review",
            "## Methodology",
            "## Expected Outcomes",
            "## Timeline",
            "## References",
        ] {
            assert!(proposal.markdown.contains(section), "missing {section}");
        }
        assert!(proposal.markdown.contains("1. https://example.org/paper"));
        assert_eq!(proposal.references.len(), 1);
    }

    #[test]
    fn test_abstract_is_truncated_to_three_sentences() {
        let proposal = compose_proposal(&idea(), &[], &[]);
        assert!(proposal.markdown.contains("Uses log replay."));
        assert!(!proposal.markdown.contains("Fourth sentence dropped."));
    }

    #[test]
    fn test_empty_inputs_still_compose() {
        let mut bare = idea();
        bare.documentation = String::new();
        let proposal = compose_proposal(&bare, &[], &[]);
        assert!(proposal.markdown.contains("No prior work"));
        assert!(proposal.markdown.contains("_No references retrieved._"));
    }
}
