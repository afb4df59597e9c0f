use clap::{CommandFactory, Parser, Subcommand};
use cli::{
    handlers::{handle_convert, handle_inspect, handle_verify},
    logging::init_logging,
};
use console::Style;

#[derive(Parser)]
#[command(version = paramdir::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the parameters stored in a file
    Inspect {
        /// Parameter file (.protobuf, .h5 or .nnp)
        path: String,
        /// Print a JSON document instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Re-encode a parameter file, choosing the format by extension
    Convert {
        input: String,
        output: String,
    },
    /// Check that two parameter files hold identical parameters
    Verify {
        expected: String,
        actual: String,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Inspect {
            path,
            json,
        }) => handle_inspect(path, json),
        Some(Commands::Convert {
            input,
            output,
        }) => handle_convert(input, output),
        Some(Commands::Verify {
            expected,
            actual,
        }) => handle_verify(expected, actual),
        None => {
            let mut cmd = Cli::command();
            cmd.print_help().map_err(|error| error.to_string())
        },
    };

    if let Err(error) = result {
        eprintln!("{} {error}", Style::new().red().bold().apply_to("error:"));
        std::process::exit(1);
    }
}
