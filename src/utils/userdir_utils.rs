#![forbid(unsafe_code)]

use path_absolutize::Absolutize;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use glob::glob;

use poem::Request;

use anyhow::{Result, anyhow};
use log::{error, debug, LevelFilter};

// ***************************************************************************
// GENERAL PUBLIC FUNCTIONS
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_absolute_path:
// ---------------------------------------------------------------------------
/** Replace tilde (~) and environment variable values in a path name and
 * then construct the absolute path name.  The difference between
 * absolutize and standard canonicalize methods is that absolutize does not
 * care about whether the file exists and what the file really is.
 *
 * On any expansion or conversion failure the original path is returned.
 */
pub fn get_absolute_path(path: &str) -> String {
    // Replace ~ and environment variable values if possible.
    let s = match shellexpand::full(path) {
        Ok(x) => x,
        Err(_) => return path.to_owned(),
    };

    // Convert to absolute path if necessary.
    let p = Path::new(s.deref());
    let p1 = match p.absolutize() {
        Ok(x) => x,
        Err(_) => return path.to_owned(),
    };
    let p2 = match p1.to_str() {
        Some(x) => x,
        None => return path.to_owned(),
    };

    p2.to_owned()
}

// ---------------------------------------------------------------------------
// get_files_in_dir:
// ---------------------------------------------------------------------------
/** Return a list of PathBufs representing the immediate children of the
 * directory whose names end with the given suffix.  This function is not
 * recursive and does not include subdirectories.
 */
pub fn get_files_in_dir(dir: &str, suffix: &str) -> Result<Vec<PathBuf>> {

    // Create the result vector and globify the directory string.
    let mut v = vec!();
    let escaped = glob::Pattern::escape(dir);
    let pattern = if escaped.ends_with('/') {escaped + "*" + suffix}
                    else {escaped + "/*" + suffix};

    // Collect all the immediate files in the directory.
    for entry in glob(&pattern)? {
        match entry {
            Ok(f) => {
                if f.is_file() {v.push(f);}
            },
            Err(e) => {
                let msg = format!("Unable to access a directory entry in {}: {:?}.", &pattern, e);
                error!("{}", msg);
                return Result::Err(anyhow!(msg));
            },
        }
    }

    Ok(v)
}

// ---------------------------------------------------------------------------
// title_case:
// ---------------------------------------------------------------------------
/** Capitalize the first letter of each whitespace-separated word and lower
 * case the rest.  Whitespace is copied through unchanged, so "NEW  york"
 * becomes "New  York".
 */
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            out.push(c);
            word_start = true;
        } else if word_start {
            out.extend(c.to_uppercase());
            word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

// ***************************************************************************
//                                  Traits
// ***************************************************************************
pub trait RequestDebug {
    type Req;
    fn get_request_info(&self) -> String;
}

// ---------------------------------------------------------------------------
// debug_request:
// ---------------------------------------------------------------------------
// Dump http request information to the log.
pub fn debug_request(http_req: &Request, req: &impl RequestDebug) {
    // Check that debug or higher logging is in effect.
    let level = log::max_level();
    if level < LevelFilter::Debug {
        return;
    }

    // Accumulate the output.
    let mut s = "\n".to_string();

    // Restate the method and URI.
    let uri = http_req.uri();
    s += format!("  {} URI: {:?}\n", http_req.method(), uri).as_str();

    // Accumulate the headers
    let it = http_req.headers().iter();
    for v in it {
         s += format!("  Header: {} = {:?} \n", v.0, v.1).as_str();
    };

    // List query parameters.
    if let Some(q) = uri.query() {
        s += format!("  Query Parameters: {:?}\n", q).as_str();
    } else {
        s += "  * No Query Parameters\n";
    }

    // Add the request's information.
    s += req.get_request_info().as_str();

    // Write the single log record.
    debug!("{}", s);
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("nyc"), "Nyc");
        assert_eq!(title_case("alice smith"), "Alice Smith");
        assert_eq!(title_case("ALICE sMITH"), "Alice Smith");
        assert_eq!(title_case("NEW  york"), "New  York");
        assert_eq!(title_case(""), "");
        assert_eq!(title_case(" leading"), " Leading");
    }

    #[test]
    fn title_case_non_ascii() {
        assert_eq!(title_case("élise"), "Élise");
        assert_eq!(title_case("12 main st"), "12 Main St");
    }

    #[test]
    fn absolute_path_keeps_absolute_input() {
        assert_eq!(get_absolute_path("/tmp/userdir"), "/tmp/userdir");
        assert!(Path::new(&get_absolute_path("relative/dir")).is_absolute());
    }

    #[test]
    fn files_in_dir_filters_by_suffix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("alice.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("sub.json")).unwrap();

        let files = get_files_in_dir(dir.path().to_str().unwrap(), ".json").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("alice.json"));
    }
}
