//! Listing pages in the PEP 503 HTML and PEP 691 JSON forms.
//!
//! Everything here is a pure function of its inputs, so equal listings
//! always render to equal bytes and can be tagged by content hash.

use crate::engine::FileEntry;
use crate::error::RenderError;
use crate::normalize::NormalizedName;
use crate::version::VersionKey;
use askama::Template;
use chrono::SecondsFormat;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use std::collections::BTreeMap;

/// Repository API version advertised by every page (PEP 629).
pub const REPOSITORY_VERSION: &str = "1.1";

/// Bytes left as-is in a URL path segment; everything else is escaped.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'+')
    .remove(b'!');

/// Percent-encode `segment` for use as one URL path segment.
///
/// ```
/// use pyindex_core::render::encode_path_segment;
/// assert_eq!(encode_path_segment("foo-1#x.tar.gz"), "foo-1%23x.tar.gz");
/// ```
pub fn encode_path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

#[derive(Template)]
#[template(path = "simple/index.html")]
struct RootTemplate<'a> {
    api_version: &'static str,
    names: &'a [NormalizedName],
}

struct FileLink<'a> {
    href: String,
    filename: &'a str,
}

#[derive(Template)]
#[template(path = "simple/project.html")]
struct ProjectTemplate<'a> {
    api_version: &'static str,
    project: &'a NormalizedName,
    links: Vec<FileLink<'a>>,
}

fn file_href(base_url: &str, file: &FileEntry) -> String {
    format!(
        "{}{}#sha256={}",
        base_url,
        encode_path_segment(&file.filename),
        file.sha256
    )
}

/// HTML root page: one link per project.
pub fn render_project_root(names: &[NormalizedName]) -> Result<String, RenderError> {
    let page = RootTemplate {
        api_version: REPOSITORY_VERSION,
        names,
    };
    Ok(page.render()?)
}

/// HTML project page: one link per file, in the given order.
///
/// `base_url` is prepended to each filename; pass `""` for hrefs relative to
/// the page.
pub fn render_project_index(
    project: &NormalizedName,
    files: &[FileEntry],
    base_url: &str,
) -> Result<String, RenderError> {
    let page = ProjectTemplate {
        api_version: REPOSITORY_VERSION,
        project,
        links: files
            .iter()
            .map(|file| FileLink {
                href: file_href(base_url, file),
                filename: &file.filename,
            })
            .collect(),
    };
    Ok(page.render()?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    pub api_version: &'static str,
}

impl Default for Meta {
    fn default() -> Self {
        Meta {
            api_version: REPOSITORY_VERSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectEntry {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectList {
    pub meta: Meta,
    pub projects: Vec<ProjectEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectFile {
    pub filename: String,
    pub url: String,
    pub hashes: BTreeMap<String, String>,
    pub size: u64,
    #[serde(rename = "upload-time")]
    pub upload_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDetail {
    pub meta: Meta,
    pub name: String,
    pub versions: Vec<String>,
    pub files: Vec<ProjectFile>,
}

impl ProjectList {
    pub fn to_json(&self) -> Result<String, RenderError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ProjectDetail {
    pub fn to_json(&self) -> Result<String, RenderError> {
        Ok(serde_json::to_string(self)?)
    }
}

pub fn project_list(names: &[NormalizedName]) -> ProjectList {
    ProjectList {
        meta: Meta::default(),
        projects: names
            .iter()
            .map(|name| ProjectEntry {
                name: name.to_string(),
            })
            .collect(),
    }
}

/// JSON project page. `versions` holds the distinct parseable versions in
/// listing order, spelled in normalized form.
pub fn project_detail(project: &NormalizedName, files: &[FileEntry], base_url: &str) -> ProjectDetail {
    let mut seen: Vec<&VersionKey> = Vec::new();
    for version in files.iter().filter_map(|file| file.version.as_ref().ok()) {
        if !seen.contains(&version) {
            seen.push(version);
        }
    }

    ProjectDetail {
        meta: Meta::default(),
        name: project.to_string(),
        versions: seen.iter().map(|v| v.to_string()).collect(),
        files: files
            .iter()
            .map(|file| ProjectFile {
                filename: file.filename.clone(),
                url: format!("{}{}", base_url, encode_path_segment(&file.filename)),
                hashes: BTreeMap::from([("sha256".to_string(), file.sha256.clone())]),
                size: file.size,
                upload_time: file
                    .uploaded_at
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::parse_version;
    use crate::normalize::normalize;
    use chrono::{TimeZone, Utc};

    fn entry(filename: &str, sha256: &str) -> FileEntry {
        FileEntry {
            filename: filename.to_string(),
            version: parse_version(filename),
            sha256: sha256.to_string(),
            size: 42,
            uploaded_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_render_project_root() {
        let names = vec![normalize("iniconfig"), normalize("pytest")];
        let html = render_project_root(&names).unwrap();
        let expected = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8" />
    <meta name="pypi:repository-version" content="1.1" />
    <title>Simple Index</title>
</head>
<body>
    <a href="iniconfig/">iniconfig</a>
    <a href="pytest/">pytest</a>
</body>
</html>"#;
        assert_eq!(html.trim_end(), expected);
    }

    #[test]
    fn test_render_empty_root() {
        let html = render_project_root(&[]).unwrap();
        assert!(html.contains("<body>\n</body>"));
        assert!(!html.contains("<a "));
    }

    #[test]
    fn test_render_project_index() {
        let project = normalize("pytest");
        let files = vec![
            entry("pytest-8.3.0-py3-none-any.whl", "aa"),
            entry("pytest-8.3.4.tar.gz", "bb"),
        ];
        let html = render_project_index(&project, &files, "/files/pytest/").unwrap();
        assert!(html.contains("<title>Links for pytest</title>"));
        assert!(html.contains("<h1>Links for pytest</h1>"));
        assert!(html.contains(
            "    <a href=\"/files/pytest/pytest-8.3.0-py3-none-any.whl#sha256=aa\">pytest-8.3.0-py3-none-any.whl</a><br />\n    <a href=\"/files/pytest/pytest-8.3.4.tar.gz#sha256=bb\">pytest-8.3.4.tar.gz</a><br />\n</body>"
        ));
    }

    #[test]
    fn test_empty_base_url_links_to_filename() {
        let project = normalize("foo");
        let html = render_project_index(&project, &[entry("foo-1.0.tar.gz", "cc")], "").unwrap();
        assert!(html.contains(r#"<a href="foo-1.0.tar.gz#sha256=cc">"#));
    }

    #[test]
    fn test_links_are_percent_encoded() {
        assert_eq!(encode_path_segment("foo_bar-1.0+local.tar.gz"), "foo_bar-1.0+local.tar.gz");
        assert_eq!(encode_path_segment("foo-1 a?b%41.zip"), "foo-1%20a%3Fb%2541.zip");
        assert_eq!(encode_path_segment("café"), "caf%C3%A9");

        let project = normalize("foo");
        let files = vec![entry("foo-1#x.tar.gz", "cc")];
        let html = render_project_index(&project, &files, "/files/foo/").unwrap();
        assert!(html.contains(r#"<a href="/files/foo/foo-1%23x.tar.gz#sha256=cc">foo-1#x.tar.gz</a>"#));

        let detail = project_detail(&project, &files, "/files/foo/");
        assert_eq!(detail.files[0].url, "/files/foo/foo-1%23x.tar.gz");
        assert_eq!(detail.files[0].filename, "foo-1#x.tar.gz");
    }

    #[test]
    fn test_html_output_is_escaped() {
        let names = vec![normalize("a<b>&\"c")];
        let html = render_project_root(&names).unwrap();
        assert!(html.contains("a&lt;b&gt;&amp;&quot;c"));
        assert!(!html.contains("a<b>"));
    }

    #[test]
    fn test_rendering_is_byte_stable() {
        let project = normalize("foo");
        let files = vec![entry("foo-1.0.tar.gz", "cc")];
        assert_eq!(
            render_project_index(&project, &files, "/f/").unwrap(),
            render_project_index(&project, &files, "/f/").unwrap()
        );
    }

    #[test]
    fn test_project_list_json() {
        let json = project_list(&[normalize("foo"), normalize("bar-baz")])
            .to_json()
            .unwrap();
        assert_eq!(
            json,
            r#"{"meta":{"api_version":"1.1"},"projects":[{"name":"foo"},{"name":"bar-baz"}]}"#
        );
    }

    #[test]
    fn test_project_detail_json() {
        let project = normalize("foo");
        let files = vec![
            entry("foo-1.0-py3-none-any.whl", "aa"),
            entry("foo-1.0.tar.gz", "bb"),
            entry("foo-1.1.tar.gz", "cc"),
            entry("foo-nightly.tar.gz", "dd"),
        ];
        let detail = project_detail(&project, &files, "/files/foo/");
        assert_eq!(detail.versions, vec!["1.0", "1.1"]);
        assert_eq!(detail.files.len(), 4);
        assert_eq!(detail.files[0].url, "/files/foo/foo-1.0-py3-none-any.whl");
        assert_eq!(detail.files[0].upload_time, "2024-05-01T12:30:00.000000Z");

        let value: serde_json::Value = serde_json::from_str(&detail.to_json().unwrap()).unwrap();
        assert_eq!(value["meta"]["api_version"], "1.1");
        assert_eq!(value["name"], "foo");
        assert_eq!(value["files"][1]["hashes"]["sha256"], "bb");
        assert_eq!(value["files"][1]["size"], 42);
        assert_eq!(value["files"][3]["upload-time"], "2024-05-01T12:30:00.000000Z");
    }
}
