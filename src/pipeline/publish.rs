//! Repository publication request building
//!
//! Validates and normalizes everything locally before the push is handed to
//! the github agent: bad input fails fast with a `Validation` error and no
//! network call is made.

use crate::agents::types::{GithubPushRequest, RepoFile};
use crate::error::{ForgeError, Result};

const DEFAULT_GITIGNORE: &str = "target/\n*.log\n.env\n__pycache__/\n.DS_Store\n";

const DEFAULT_LICENSE: &str = "MIT License\n\n\
Permission is hereby granted, free of charge, to any person obtaining a copy \
of this software and associated documentation files (the \"Software\"), to deal \
in the Software without restriction, subject to the conditions of the MIT \
license as published at https://opensource.org/licenses/MIT.\n";

/// Caller-facing publication input
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PublishDoc {
    pub token: String,
    pub owner: String,
    #[serde(default)]
    pub repo_name: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub files: Vec<RepoFile>,
    #[serde(default)]
    pub visibility: Option<String>,
}

/// Build a push request from a publication doc. All validation happens here,
/// before any network activity.
pub fn build_push_request(doc: PublishDoc) -> Result<GithubPushRequest> {
    if doc.token.trim().is_empty() {
        return Err(ForgeError::Validation("github token is required".into()));
    }
    if doc.owner.trim().is_empty() {
        return Err(ForgeError::Validation("repository owner is required".into()));
    }
    if !doc
        .owner
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ForgeError::Validation(format!(
            "invalid repository owner '{}'",
            doc.owner
        )));
    }
    if doc.files.is_empty() {
        return Err(ForgeError::Validation(
            "at least one file is required to publish".into(),
        ));
    }
    for file in &doc.files {
        let path = file.path.trim();
        if path.is_empty() {
            return Err(ForgeError::Validation("file with empty path".into()));
        }
        if path.starts_with('/') || path.split('/').any(|seg| seg == "..") {
            return Err(ForgeError::Validation(format!(
                "unsafe file path '{}'",
                file.path
            )));
        }
    }

    let repo_name = match doc.repo_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => slugify(name),
        _ => slugify(&doc.title),
    };

    let mut files = doc.files;
    if !has_file(&files, "README.md") {
        files.push(RepoFile {
            path: "README.md".into(),
            content: format!(
                "# {}\n\n{}\n",
                doc.title,
                doc.description.as_deref().unwrap_or("Generated project.")
            ),
        });
    }
    if !has_file(&files, ".gitignore") {
        files.push(RepoFile {
            path: ".gitignore".into(),
            content: DEFAULT_GITIGNORE.into(),
        });
    }
    if !has_file(&files, "LICENSE") {
        files.push(RepoFile {
            path: "LICENSE".into(),
            content: DEFAULT_LICENSE.into(),
        });
    }

    Ok(GithubPushRequest {
        token: doc.token,
        owner: doc.owner,
        repo_name,
        files,
        visibility: doc
            .visibility
            .filter(|v| v == "public" || v == "private")
            .unwrap_or_else(|| "private".to_string()),
        description: doc.description.map(|d| sanitize_description(&d)),
    })
}

fn has_file(files: &[RepoFile], path: &str) -> bool {
    files.iter().any(|f| f.path == path)
}

/// Lowercase, hyphen-separated repository name; never empty.
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut last_hyphen = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug.truncate(100);
    if slug.is_empty() {
        "generated-project".to_string()
    } else {
        slug
    }
}

/// Single line, bounded length.
fn sanitize_description(description: &str) -> String {
    let one_line = description
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    one_line.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> PublishDoc {
        PublishDoc {
            token: "ghp_test".into(),
            owner: "octo-researcher".into(),
            repo_name: None,
            title: "Distributed Cache Warmer!".into(),
            description: Some("Warms caches\nahead of traffic".into()),
            files: vec![RepoFile {
                path: "src/main.rs".into(),
                content: "fn main() {}".into(),
            }],
            visibility: None,
        }
    }

    #[test]
    fn test_empty_files_fail_validation() {
        let mut d = doc();
        d.files.clear();
        assert!(matches!(
            build_push_request(d),
            Err(ForgeError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_token_or_owner_fail_validation() {
        let mut d = doc();
        d.token = "  ".into();
        assert!(matches!(
            build_push_request(d),
            Err(ForgeError::Validation(_))
        ));

        let mut d = doc();
        d.owner = "bad owner!".into();
        assert!(matches!(
            build_push_request(d),
            Err(ForgeError::Validation(_))
        ));
    }

    #[test]
    fn test_unsafe_paths_rejected() {
        let mut d = doc();
        d.files.push(RepoFile {
            path: "../escape.txt".into(),
            content: String::new(),
        });
        assert!(matches!(
            build_push_request(d),
            Err(ForgeError::Validation(_))
        ));
    }

    #[test]
    fn test_slugified_name_and_backfill() {
        let request = build_push_request(doc()).unwrap();
        assert_eq!(request.repo_name, "distributed-cache-warmer");
        assert_eq!(request.visibility, "private");

        let paths: Vec<_> = request.files.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"README.md"));
        assert!(paths.contains(&".gitignore"));
        assert!(paths.contains(&"LICENSE"));
        assert_eq!(
            request.description.as_deref(),
            Some("Warms caches ahead of traffic")
        );
    }

    #[test]
    fn test_existing_readme_not_overwritten() {
        let mut d = doc();
        d.files.push(RepoFile {
            path: "README.md".into(),
            content: "custom readme".into(),
        });
        let request = build_push_request(d).unwrap();
        let readme: Vec<_> = request
            .files
            .iter()
            .filter(|f| f.path == "README.md")
            .collect();
        assert_eq!(readme.len(), 1);
        assert_eq!(readme[0].content, "custom readme");
    }

    #[test]
    fn test_slugify_edge_cases() {
        assert_eq!(slugify("  Quantum!!  Mesh  "), "quantum-mesh");
        assert_eq!(slugify("???"), "generated-project");
    }
}
