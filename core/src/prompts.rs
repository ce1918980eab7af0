//! Prompt templates for per-chunk analysis and report synthesis.

use crate::types::{ChunkContext, ReportVariant};

/// Questions asked of every chunk.
pub const ANALYSIS_QUESTIONS: [&str; 4] = [
    "What functionality does this code implement?",
    "Which patterns or architecture does it use?",
    "Which libraries, dependencies, or frameworks does it rely on?",
    "How does it fit into the overall project structure?",
];

/// Sections of the `analysis` report.
pub const ANALYSIS_SECTIONS: [(&str, &str); 6] = [
    ("Introduction", "What is the project about?"),
    ("Idea", "Which problem does it solve or which goal does it pursue?"),
    ("Features", "The key functionality and capabilities the project offers."),
    ("Implementation", "How it works internally, highlighting logic and workflow."),
    ("Tech Stack Used", "Languages, frameworks, and libraries used in the code."),
    ("Conclusion", "A wrap-up of the project's core functionality and value."),
];

/// Sections of the `readme` report, after the `# {project}` title.
pub const README_SECTIONS: [(&str, &str); 7] = [
    ("Introduction", "Briefly describe what the project is and its purpose."),
    ("Problem Statement / Idea", "The problem it solves or the goal it aims for."),
    ("Features", "Key features implemented in the code."),
    (
        "How It Works (Implementation Overview)",
        "Internal logic, core components, and workflow.",
    ),
    ("Tech Stack", "Languages, libraries, frameworks, and tools used."),
    (
        "Getting Started",
        "Setup steps, only if the code shows them (setup.py, package.json, Dockerfile, ...).",
    ),
    ("Conclusion", "A summary of capabilities and use cases."),
];

/// Checklist groups of the `guidance` report.
pub const GUIDANCE_CATEGORIES: [&str; 8] = [
    "Frontend",
    "Backend",
    "API",
    "Database",
    "Authentication",
    "Testing",
    "Deployment",
    "Code Quality",
];

pub const GUIDANCE_HEADER: &str = "## Next Steps to Complete and Deploy the Project";

pub fn analysis_prompt(ctx: &ChunkContext<'_>) -> String {
    let questions = numbered(ANALYSIS_QUESTIONS.iter().copied());
    format!(
        "You are a code analyst. Analyze the following code from a source repository.\n\
         This is {label}.\n\n\
         CODE:\n```\n{code}\n```\n\n\
         Extract the insights needed to understand:\n{questions}\n\n\
         Answer concisely, focusing on the key insights.",
        label = ctx.label(),
        code = ctx.text,
    )
}

pub fn synthesis_prompt(variant: ReportVariant, project: &str, corpus: &str) -> String {
    match variant {
        ReportVariant::Analysis => {
            let sections = numbered(
                ANALYSIS_SECTIONS
                    .iter()
                    .map(|(title, ask)| format!("**{title}**: {ask}")),
            );
            format!(
                "You are a technical documentation expert. Using the code analyses below from \
                 the repository \"{project}\", write a comprehensive Markdown report with these \
                 sections:\n\n{sections}\n\n\
                 CODE ANALYSES:\n{corpus}\n\n\
                 Respond with a valid Markdown document. Be specific and technical and state \
                 only what the code shows. Use headers, code blocks, and bullet points where \
                 they help."
            )
        }
        ReportVariant::Readme => {
            let mut sections = vec![format!("**# {project}**: use this as the title.")];
            sections.extend(
                README_SECTIONS
                    .iter()
                    .map(|(title, ask)| format!("**## {title}**: {ask}")),
            );
            let sections = numbered(sections.into_iter());
            format!(
                "You are a README generator and technical documentation expert. Using the code \
                 analyses below from the repository \"{project}\", write a professional README \
                 in Markdown with these sections:\n\n{sections}\n\n\
                 CODE ANALYSES:\n{corpus}\n\n\
                 Guidelines:\n\
                 - Include only what the analyses show; do not speculate.\n\
                 - Use proper Markdown formatting.\n\
                 - Keep it clear, concise, and technically accurate."
            )
        }
        ReportVariant::Guidance => {
            let groups = GUIDANCE_CATEGORIES
                .iter()
                .map(|c| format!("**{c}**"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "You are a senior software engineer and project architect. Using the code \
                 analyses below from the repository \"{project}\", produce a prioritized \
                 Markdown checklist of the work needed to turn the project into a complete, \
                 deployable full-stack application.\n\n\
                 - Rely only on what the code shows or implies.\n\
                 - Identify missing layers or components, incomplete features, bugs and \
                 unhandled edge cases, and areas to optimize or clean up.\n\
                 - If a frontend, backend, database, authentication, or deployment setup is \
                 missing, describe what must be built.\n\
                 - Group tasks under: {groups}.\n\
                 - List only gaps; never repeat completed work unless it needs improvement.\n\
                 - Put foundational tasks before feature additions.\n\n\
                 Use this header for the document:\n\n{GUIDANCE_HEADER}\n\n\
                 CODE ANALYSES:\n{corpus}"
            )
        }
    }
}

fn numbered<S: AsRef<str>>(items: impl Iterator<Item = S>) -> String {
    items
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
