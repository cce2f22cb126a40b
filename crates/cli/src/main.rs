//! `df1` — talk to an SLC 500 or MicroLogix controller over a serial port.

use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use df1_core::{
    ChecksumKind, Client, ClientConfig, CommSettings, Parity, ProtocolKind, TagValues,
};

#[derive(Parser)]
#[command(name = "df1", version, about = "Allen-Bradley DF1/DH485 client")]
struct Cli {
    /// Serial port, e.g. /dev/ttyUSB0 or COM3.
    #[arg(short, long)]
    port: String,

    /// Baud rate.
    #[arg(long, default_value_t = 19200)]
    baud: u32,

    /// Parity: none, even, or odd.
    #[arg(long, default_value = "none", value_parser = parse_parity)]
    parity: Parity,

    /// Checksum: crc or bcc.
    #[arg(long, default_value = "crc", value_parser = parse_checksum)]
    checksum: ChecksumKind,

    /// Framing: df1 or dh485.
    #[arg(long, default_value = "df1", value_parser = parse_protocol)]
    protocol: ProtocolKind,

    /// Our station number.
    #[arg(long, default_value_t = 0)]
    my_node: u8,

    /// The controller's station number.
    #[arg(long, default_value_t = 1)]
    target_node: u8,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read values from a data-table address.
    Read {
        /// Address, e.g. N7:0, F8:2, T4:0.ACC, B3/16.
        address: String,
        /// Number of elements (or bits for bit addresses).
        #[arg(short, long, default_value_t = 1)]
        count: u16,
    },
    /// Write values to a data-table address.
    Write {
        /// Address, e.g. N7:0 or B3:5/4.
        address: String,
        /// One value per element, parsed according to the file type.
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Report the processor family.
    Status,
    /// List the controller's data tables.
    Dir,
    /// Upload the whole program and summarize it.
    Upload,
    /// Sweep baud, parity, and checksum until the controller answers.
    Detect,
}

fn parse_parity(text: &str) -> Result<Parity, String> {
    match text.to_ascii_lowercase().as_str() {
        "none" => Ok(Parity::None),
        "even" => Ok(Parity::Even),
        "odd" => Ok(Parity::Odd),
        other => Err(format!("unknown parity `{other}`")),
    }
}

fn parse_checksum(text: &str) -> Result<ChecksumKind, String> {
    match text.to_ascii_lowercase().as_str() {
        "crc" | "crc16" => Ok(ChecksumKind::Crc16),
        "bcc" => Ok(ChecksumKind::Bcc),
        other => Err(format!("unknown checksum `{other}`")),
    }
}

fn parse_protocol(text: &str) -> Result<ProtocolKind, String> {
    match text.to_ascii_lowercase().as_str() {
        "df1" => Ok(ProtocolKind::Df1),
        "dh485" => Ok(ProtocolKind::Dh485),
        other => Err(format!("unknown protocol `{other}`")),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    df1_logging::init(cli.verbose);

    let config = ClientConfig::builder()
        .port(cli.port.clone())
        .baud(cli.baud)
        .parity(cli.parity)
        .checksum(cli.checksum)
        .protocol(cli.protocol)
        .my_node(cli.my_node)
        .target_node(cli.target_node)
        .build();
    let client = Client::new(config);

    match run(&client, &cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("df1: {error} (code {})", error.code());
            ExitCode::FAILURE
        }
    }
}

fn run(client: &Client, command: &Command) -> df1_core::Result<()> {
    match command {
        Command::Read { address, count } => {
            print_values(&client.read_values(address, *count)?);
        }
        Command::Write { address, values } => {
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            client.write_values(address, &values)?;
        }
        Command::Status => {
            let family = client.processor_type()?;
            println!("{} (code 0x{:02X})", family.name(), family.code());
        }
        Command::Dir => {
            for table in client.data_tables()? {
                println!(
                    "{}{}  {} elements",
                    table.tag(),
                    table.file_number(),
                    table.element_count()
                );
            }
        }
        Command::Upload => {
            let image = client.upload_program()?;
            println!("directory: {} bytes", image.directory().len());
            for file in image.files() {
                println!(
                    "type 0x{:02X} file {}: {} bytes",
                    file.type_code(),
                    file.file_number(),
                    file.data().len()
                );
            }
        }
        Command::Detect => {
            let CommSettings {
                baud,
                parity,
                checksum,
            } = client.detect_comm_settings()?;
            println!("{baud} baud, parity {}, {}", parity.name(), checksum.name());
        }
    }
    Ok(())
}

fn print_values(values: &TagValues) {
    match values {
        TagValues::Bits(bits) => {
            for bit in bits {
                println!("{}", u8::from(*bit));
            }
        }
        TagValues::Integers(words) => {
            for word in words {
                println!("{word}");
            }
        }
        TagValues::Longs(longs) => {
            for long in longs {
                println!("{long}");
            }
        }
        TagValues::Floats(floats) => {
            for float in floats {
                println!("{float}");
            }
        }
        TagValues::Strings(strings) => {
            for text in strings {
                println!("{text}");
            }
        }
        TagValues::Raw(blocks) => {
            for block in blocks {
                let hex: Vec<String> = block.iter().map(|byte| format!("{byte:02X}")).collect();
                println!("{}", hex.join(" "));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_parse() {
        let cli = Cli::parse_from([
            "df1", "--port", "/dev/ttyUSB0", "--baud", "9600", "--parity", "even", "--checksum",
            "bcc", "read", "N7:0", "--count", "4",
        ]);
        assert_eq!(cli.baud, 9600);
        assert_eq!(cli.parity, Parity::Even);
        assert_eq!(cli.checksum, ChecksumKind::Bcc);
        match cli.command {
            Command::Read { ref address, count } => {
                assert_eq!(address, "N7:0");
                assert_eq!(count, 4);
            }
            _ => panic!("expected read"),
        }
    }

    #[test]
    fn bad_parity_is_rejected() {
        assert!(Cli::try_parse_from(["df1", "--port", "COM1", "--parity", "mark", "status"]).is_err());
    }
}
