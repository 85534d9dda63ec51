use o2paris::app::LaunchOptions;
use o2paris::model::View;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    o2paris::app::run(options)
}

fn parse_args(args: Vec<String>) -> anyhow::Result<LaunchOptions> {
    let mut out = LaunchOptions::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--catalog" => {
                index += 1;
                out.catalog = Some(PathBuf::from(required_value(&args, index, "--catalog")?));
            }
            "--scan" => {
                index += 1;
                out.scan = Some(PathBuf::from(required_value(&args, index, "--scan")?));
            }
            "--mute" => out.mute = true,
            "--view" => {
                index += 1;
                let value = required_value(&args, index, "--view")?;
                let Some(view) = View::parse(value) else {
                    anyhow::bail!("--view expects gallery or map, got {value}");
                };
                out.view = Some(view);
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn required_value<'a>(args: &'a [String], index: usize, flag: &str) -> anyhow::Result<&'a str> {
    let Some(value) = args.get(index) else {
        anyhow::bail!("{flag} requires a value");
    };
    if value.trim().is_empty() {
        anyhow::bail!("{flag} cannot be empty");
    }
    Ok(value.trim())
}

fn print_help() {
    println!("O2Paris");
    println!("  --catalog <path>      Catalog file with tiles, pinpoints and map config");
    println!("  --scan <dir>          Build the gallery from the images in a folder");
    println!("  --mute                Run without opening an audio output");
    println!("  --view gallery|map    View to start in");
    println!();
    println!("Settings and o2paris.log live in O2PARIS_CONFIG_DIR (default ~/.config/o2paris).");
    println!("Log verbosity follows O2PARIS_LOG, e.g. O2PARIS_LOG=o2paris=debug.");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parses_every_flag() {
        let options = parse_args(args(&[
            "--catalog",
            "site.json",
            "--scan",
            "photos",
            "--mute",
            "--view",
            "map",
        ]))
        .expect("parse");
        assert_eq!(options.catalog, Some(PathBuf::from("site.json")));
        assert_eq!(options.scan, Some(PathBuf::from("photos")));
        assert!(options.mute);
        assert_eq!(options.view, Some(View::Map));
    }

    #[test]
    fn rejects_missing_values_and_unknown_flags() {
        assert!(parse_args(args(&["--catalog"])).is_err());
        assert!(parse_args(args(&["--view", "globe"])).is_err());
        assert!(parse_args(args(&["--host"])).is_err());
    }
}
