use std::fs;
use std::path::{Path, PathBuf};

const MAX_WIDTH: usize = 100;

fn rust_sources(dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            rust_sources(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
}

fn crate_sources() -> Vec<(PathBuf, String)> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut paths = Vec::new();
    rust_sources(&root.join("src"), &mut paths);
    rust_sources(&root.join("tests"), &mut paths);
    paths.sort();
    assert!(!paths.is_empty());

    paths
        .into_iter()
        .map(|path| {
            let text = fs::read_to_string(&path).unwrap();
            (path, text)
        })
        .collect()
}

#[test]
fn modules_open_with_plain_line_comments() {
    let offenders: Vec<String> = crate_sources()
        .iter()
        .filter(|(_, text)| text.lines().any(|line| line.starts_with("//!")))
        .map(|(path, _)| path.display().to_string())
        .collect();
    assert!(offenders.is_empty(), "inner doc headers: {:?}", offenders);
}

#[test]
fn lines_fit_in_one_hundred_columns() {
    let mut offenders = Vec::new();
    for (path, text) in crate_sources() {
        for (index, line) in text.lines().enumerate() {
            // 한글 주석이 있으므로 바이트가 아닌 문자 수로 측정
            if line.chars().count() > MAX_WIDTH {
                offenders.push(format!("{}:{}", path.display(), index + 1));
            }
        }
    }
    assert!(offenders.is_empty(), "lines over {} columns: {:?}", MAX_WIDTH, offenders);
}
