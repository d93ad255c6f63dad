use tuys_tui::app::RunOptions;

const HELP: &str = "Tuys-TUI: Read, like and moderate Tuys stories from the terminal.

  --version, -V        Show version and exit
  --help,    -h        Show this help message
  --offline            Browse sample stories without contacting the API
  --channel <name>     Only show stories from one channel";

fn main() {
    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(Some(opts)) => opts,
        Ok(None) => return,
        Err(message) => {
            eprintln!("error: {message}\n\n{HELP}");
            std::process::exit(2);
        }
    };

    if let Err(err) = tuys_tui::run(opts) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

/// Returns `Ok(None)` when a flag was fully handled and the app should exit.
fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Option<RunOptions>, String> {
    let mut opts = RunOptions::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Tuys-TUI {}", tuys_tui::VERSION);
                return Ok(None);
            }
            "--help" | "-h" => {
                println!("{HELP}");
                return Ok(None);
            }
            "--offline" => opts.offline = true,
            "--channel" => {
                let channel = args
                    .next()
                    .filter(|value| !value.starts_with('-'))
                    .ok_or_else(|| "--channel needs a value".to_string())?;
                opts.channel = Some(channel);
            }
            other => return Err(format!("unknown argument {other:?}")),
        }
    }
    Ok(Some(opts))
}
