use clap::Parser;
use std::path::PathBuf;

/// Bounding-box image annotator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Image folder, or one or more image files (PNG, JPEG)
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Annotation store file (default: annotations.json in the data directory)
    #[arg(short = 's', long = "store", value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Class id assigned to newly drawn boxes (digit keys change it at runtime)
    #[arg(long = "class", value_name = "N")]
    pub class_id: Option<u32>,

    /// Enable debug logging to file (default: annotator.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let args = Args::parse_from([
            "annotator", "shots/", "--store", "db.json", "--class", "3", "-vv", "--log",
        ]);
        assert_eq!(args.paths, vec![PathBuf::from("shots/")]);
        assert_eq!(args.store, Some(PathBuf::from("db.json")));
        assert_eq!(args.class_id, Some(3));
        assert_eq!(args.verbosity, 2);
        assert_eq!(args.log_file, Some(None));
    }

    #[test]
    fn test_parse_defaults() {
        let args = Args::parse_from(["annotator"]);
        assert!(args.paths.is_empty());
        assert_eq!(args.log_file, None);
        assert_eq!(args.verbosity, 0);
    }
}
