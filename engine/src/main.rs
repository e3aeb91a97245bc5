use clap::Parser;
use engine::{
    EngineConfig, FallbackWordSource, FileStore, FixedCounts, SessionEngine, SnapshotFormat,
    StaticWordPairSource,
};
use log::{info, warn};
use shared::{DEFAULT_MAX_PLAYERS, DISCUSSION_TIME_SECONDS};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs one round of a local Undercover game", long_about = None)]
struct Args {
    /// Nickname of the host
    #[arg(long, default_value = "Host")]
    host: String,

    /// Players to seat after the host, comma separated
    #[arg(short, long, value_delimiter = ',', default_value = "Bob,Cara")]
    players: Vec<String>,

    /// Room capacity
    #[arg(short, long, default_value_t = DEFAULT_MAX_PLAYERS)]
    max_players: usize,

    /// Number of Undercover players to deal
    #[arg(short, long, default_value_t = 1)]
    undercover: usize,

    /// Number of MrWhite players to deal
    #[arg(long, default_value_t = 0)]
    mr_white: usize,

    /// Word category to draw from
    #[arg(short, long, default_value = "Everyday Words")]
    category: String,

    /// Discussion time before voting opens, in seconds
    #[arg(short, long, default_value_t = DISCUSSION_TIME_SECONDS)]
    discussion_secs: u64,

    /// Directory holding the saved session
    #[arg(long, default_value = ".undercover")]
    state_dir: PathBuf,

    /// Snapshot encoding: json or bincode
    #[arg(long, default_value = "json")]
    format: SnapshotFormat,

    /// Seed for role dealing
    #[arg(long)]
    seed: Option<u64>,

    /// Ignore any saved session and start a new game
    #[arg(long)]
    fresh: bool,

    /// Print every player's role and word at the end
    #[arg(long)]
    reveal: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut config = EngineConfig::default()
        .with_discussion_duration(Duration::from_secs(args.discussion_secs))
        .with_snapshot_format(args.format);
    config.rng_seed = args.seed;

    let engine = SessionEngine::new(config);
    let store = FileStore::new(&args.state_dir);

    if !args.fresh {
        engine.load_from(&store).await;
    }

    let game = match engine.list_available_games().await.into_iter().next() {
        Some(game) => {
            info!("Resuming game {} at round {}", game.id, game.current_round);
            game
        }
        None => {
            let game = engine.start_game(&args.host, args.max_players).await?;
            for nickname in &args.players {
                if engine.join_game(&game.id, nickname).await.is_none() {
                    warn!("Could not seat {}", nickname);
                }
            }
            game
        }
    };
    println!("Room code: {}", game.id);

    let words = FallbackWordSource::new(StaticWordPairSource::default());
    let policy = FixedCounts::new(args.undercover, args.mr_white);
    engine.start_round(&game.id, &words, &args.category, &policy).await?;
    info!("Discussion running for {}s", args.discussion_secs);

    tokio::select! {
        _ = wait_for_voting(&engine, &game.id) => {
            info!("Voting is open");
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, saving game...");
        }
    }

    engine.save_to(&store).await?;
    info!("Saved game to {}", store.dir().display());

    if let Some(state) = engine.get_game_state(&game.id).await {
        println!("{}", serde_json::to_string_pretty(&state)?);

        if args.reveal {
            for player in &state.players {
                if let Some(info) = engine.player_info(&game.id, &player.id).await {
                    println!("{:<12} {:<10} {}", player.nickname, info.role, info.secret_word);
                }
            }
        }
    }

    Ok(())
}

/// Polls the session until the round timer has opened voting.
async fn wait_for_voting(engine: &SessionEngine, game_id: &str) {
    let mut ticker = interval(Duration::from_millis(250));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match engine.get_game_state(game_id).await {
            Some(state) if state.voting_phase() => return,
            Some(_) => {}
            None => {
                warn!("Game {} disappeared while waiting for voting", game_id);
                return;
            }
        }
    }
}
