use bankcards_ledger::cli;
use bankcards_ledger::strategy;
use bankcards_ledger::telemetry;
use std::process;
use tracing::error;

fn main() {
    telemetry::init();

    let args = cli::parse_args();

    let strategy = {
        let batch = if args.strategy == cli::StrategyType::Async {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy.clone(), args.to_bank_config(), batch)
    };

    // Card states go to stdout; logs go to stderr.
    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        error!(error = %e, "Replay failed");
        process::exit(1);
    }
}
