// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery and parsing of per-test YAML headers (§6).

use crate::constants::TEST_FOLDER_PATH;
use crate::test_run::{TestSpec, TestSpecHeader};
use camino::{Utf8Path, Utf8PathBuf};

/// Find every `<test_glob>*.c` file under `sweb_src/userspace/tests`, parse
/// its leading YAML header, and return the recognized `TestSpec`s sorted by
/// name, descending (matches the source's queue-diversity ordering, §4.7).
pub fn discover_test_specs(
    sweb_src: &Utf8Path,
    test_glob: &str,
) -> Result<Vec<TestSpec>, std::io::Error> {
    let pattern = sweb_src.join(TEST_FOLDER_PATH).join(format!("{test_glob}*.c"));
    let mut specs = Vec::new();

    let paths = glob::glob(pattern.as_str())
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    for entry in paths {
        let path = entry.map_err(|e| e.into_error())?;
        let path = Utf8PathBuf::from_path_buf(path)
            .map_err(|p| std::io::Error::other(format!("non-UTF-8 path: {}", p.display())))?;
        if let Some(spec) = parse_test_spec(&path)? {
            specs.push(spec);
        }
    }

    specs.sort_by(|a, b| b.test_name.cmp(&a.test_name));
    Ok(specs)
}

/// Parse the leading block-comment YAML header of a single test source
/// file. Returns `Ok(None)` (not an error) when no recognizable header is
/// present, per §6: "Absence of a recognizable header means the file is
/// silently not a test."
pub fn parse_test_spec(path: &Utf8Path) -> Result<Option<TestSpec>, std::io::Error> {
    let text = fs_err::read_to_string(path)?;
    let mut lines = text.lines();

    let Some(first) = lines.next() else {
        return Ok(None);
    };
    if !first.contains("/*") {
        return Ok(None);
    }

    let second = lines.clone().next();
    let has_document_marker =
        first.contains("---") || second.is_some_and(|line| line.contains("---"));
    if !has_document_marker {
        return Ok(None);
    }

    let mut yaml_block = String::new();
    for line in lines {
        if line.contains("*/") {
            break;
        }
        yaml_block.push_str(line);
        yaml_block.push('\n');
    }

    let header: TestSpecHeader = match serde_yaml::from_str(&yaml_block) {
        Ok(header) => header,
        Err(_) => return Ok(None),
    };

    let test_name = path
        .file_stem()
        .map(str::to_string)
        .unwrap_or_else(|| path.to_string());

    Ok(Some(TestSpec {
        test_name,
        source_path: path.to_owned(),
        header,
    }))
}

/// Keep specs whose category is in `categories` (if non-empty) and whose
/// tags intersect `tags` (if non-empty).
pub fn filter_test_specs(specs: Vec<TestSpec>, categories: &[String], tags: &[String]) -> Vec<TestSpec> {
    specs
        .into_iter()
        .filter(|spec| categories.is_empty() || categories.iter().any(|c| c == spec.category()))
        .filter(|spec| tags.is_empty() || tags.iter().any(|t| spec.tags().contains(t)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_temp(name: &str, content: &str) -> Utf8PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "tortillas-test-spec-{}-{}",
            std::process::id(),
            name
        ));
        fs_err::create_dir_all(&dir).unwrap();
        let path = Utf8PathBuf::from_path_buf(dir).unwrap().join(format!("{name}.c"));
        fs_err::write(&path, content).unwrap();
        path
    }

    #[test]
    fn parses_recognized_header() {
        let path = write_temp(
            "probe",
            "/*\n\
             ---\n\
             category: threading\n\
             description: a probe test\n\
             tags: [smoke, fast]\n\
             */\n\
             int main() { return 0; }\n",
        );
        let spec = parse_test_spec(&path).unwrap().unwrap();
        assert_eq!(spec.test_name, "probe");
        assert_eq!(spec.category(), "threading");
        assert!(spec.tags().contains("smoke"));
    }

    #[test]
    fn absence_of_header_is_silently_not_a_test() {
        let path = write_temp("not_a_test", "int main() { return 0; }\n");
        assert!(parse_test_spec(&path).unwrap().is_none());
    }

    #[test]
    fn defaults_apply_for_optional_fields() {
        let path = write_temp(
            "defaults",
            "/* ---\n\
             category: mem\n\
             description: defaults check\n\
             */\n",
        );
        let spec = parse_test_spec(&path).unwrap().unwrap();
        assert!(!spec.header.disabled);
        assert_eq!(spec.expect_exit_codes(), vec![0]);
    }

    #[test]
    fn filters_by_category_and_tags() {
        let a = TestSpec {
            test_name: "a".to_string(),
            source_path: Utf8PathBuf::from("a.c"),
            header: TestSpecHeader {
                category: "threading".to_string(),
                description: "d".to_string(),
                disabled: false,
                timeout: 0,
                expect_timeout: false,
                expect_exit_codes: vec![],
                tags: ["fast".to_string()].into_iter().collect(),
            },
        };
        let mut b = a.clone();
        b.test_name = "b".to_string();
        b.header.category = "memory".to_string();
        b.header.tags = ["slow".to_string()].into_iter().collect();

        let filtered = filter_test_specs(vec![a.clone(), b.clone()], &["threading".to_string()], &[]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].test_name, "a");

        let filtered = filter_test_specs(vec![a, b], &[], &["slow".to_string()]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].test_name, "b");
    }
}
