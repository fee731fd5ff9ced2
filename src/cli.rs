//! Command-line surface of the operator console

use aeromatrix_shared::protocol::{BatchEntry, DroneChanges, NewDrone};
use aeromatrix_shared::{net, CommandInput, DroneId, MatrixId, Orientation, Request};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "aeromatrix")]
#[command(about = "Operator console for the AeroMatrix fleet server")]
pub struct Cli {
    /// Fleet server address
    #[arg(long, default_value_t = format!("127.0.0.1:{}", net::DEFAULT_PORT))]
    pub server: String,

    #[arg(long, default_value = "5")]
    pub connect_timeout_secs: u64,

    /// Extra connection attempts after the first
    #[arg(long, default_value = "3")]
    pub retries: u32,

    /// Print raw JSON responses
    #[arg(long)]
    pub json: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage matrices
    #[command(subcommand)]
    Matrix(MatrixCommand),
    /// Manage drones
    #[command(subcommand)]
    Drone(DroneCommand),
    /// Send a command sequence to one drone
    Fly {
        drone_id: DroneId,
        /// Commands, e.g. AALR
        commands: String,
    },
    /// Send the same sequence to several drones, in the listed order
    FlyMany {
        #[arg(long)]
        matrix: Option<MatrixId>,
        #[arg(long, value_delimiter = ',', required = true)]
        drones: Vec<DroneId>,
        commands: String,
    },
    /// Send a sequence per drone, in the listed order (entries as ID:COMMANDS)
    Batch {
        #[arg(long)]
        matrix: Option<MatrixId>,
        #[arg(required = true, value_parser = parse_batch_entry)]
        entries: Vec<BatchEntry>,
    },
}

#[derive(Debug, Subcommand)]
pub enum MatrixCommand {
    List,
    Get { id: MatrixId },
    Create(BoundsArgs),
    Update {
        id: MatrixId,
        #[command(flatten)]
        bounds: BoundsArgs,
    },
    Delete { id: MatrixId },
}

#[derive(Debug, Args)]
pub struct BoundsArgs {
    #[arg(long)]
    pub max_x: u32,
    #[arg(long)]
    pub max_y: u32,
}

#[derive(Debug, Subcommand)]
pub enum DroneCommand {
    List,
    Get {
        id: DroneId,
    },
    Create {
        #[arg(long)]
        matrix: MatrixId,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        model: String,
        #[arg(long)]
        x: u32,
        #[arg(long)]
        y: u32,
        /// N, E, S or W
        #[arg(long)]
        orientation: Orientation,
    },
    Update {
        id: DroneId,
        #[arg(long)]
        matrix: Option<MatrixId>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        x: Option<u32>,
        #[arg(long)]
        y: Option<u32>,
        #[arg(long)]
        orientation: Option<Orientation>,
    },
    Delete {
        id: DroneId,
    },
}

fn parse_batch_entry(raw: &str) -> Result<BatchEntry, String> {
    let (id, commands) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected ID:COMMANDS, got '{}'", raw))?;
    let drone_id = id
        .trim()
        .parse()
        .map_err(|e| format!("bad drone id '{}': {}", id, e))?;

    Ok(BatchEntry {
        drone_id,
        commands: CommandInput::Text(commands.to_string()),
    })
}

impl Commands {
    /// The wire request this subcommand stands for
    pub fn into_request(self) -> Request {
        match self {
            Commands::Matrix(cmd) => match cmd {
                MatrixCommand::List => Request::ListMatrices,
                MatrixCommand::Get { id } => Request::GetMatrix { id },
                MatrixCommand::Create(b) => Request::CreateMatrix {
                    max_x: b.max_x,
                    max_y: b.max_y,
                },
                MatrixCommand::Update { id, bounds } => Request::UpdateMatrix {
                    id,
                    max_x: bounds.max_x,
                    max_y: bounds.max_y,
                },
                MatrixCommand::Delete { id } => Request::DeleteMatrix { id },
            },
            Commands::Drone(cmd) => match cmd {
                DroneCommand::List => Request::ListDrones,
                DroneCommand::Get { id } => Request::GetDrone { id },
                DroneCommand::Create {
                    matrix,
                    name,
                    model,
                    x,
                    y,
                    orientation,
                } => Request::CreateDrone(NewDrone {
                    name,
                    model,
                    x,
                    y,
                    orientation,
                    matrix_id: matrix,
                }),
                DroneCommand::Update {
                    id,
                    matrix,
                    name,
                    model,
                    x,
                    y,
                    orientation,
                } => Request::UpdateDrone {
                    id,
                    changes: DroneChanges {
                        name,
                        model,
                        x,
                        y,
                        orientation,
                        matrix_id: matrix,
                    },
                },
                DroneCommand::Delete { id } => Request::DeleteDrone { id },
            },
            Commands::Fly { drone_id, commands } => Request::DroneCommands {
                drone_id,
                commands: CommandInput::Text(commands),
            },
            Commands::FlyMany {
                matrix,
                drones,
                commands,
            } => Request::MatrixDroneCommands {
                matrix_id: matrix,
                drone_ids: drones,
                commands: CommandInput::Text(commands),
            },
            Commands::Batch { matrix, entries } => Request::BatchCommands {
                matrix_id: matrix,
                commands: entries,
            },
        }
    }
}
