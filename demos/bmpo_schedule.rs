// Demonstration: print the Walker2d BMPO configuration and its schedules.
//
// Run:
//   cargo run --example bmpo_schedule -- --config path/to/bmpo.json --epochs 200

use std::env;

use rl_lab::BmpoConfig;

fn main() -> rl_lab::Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = match arg_value(&args, "--config") {
        Some(path) => BmpoConfig::from_path(path)?,
        None => BmpoConfig::walker2d(),
    };
    let epochs: usize = arg_value(&args, "--epochs")
        .and_then(|s| s.parse().ok())
        .unwrap_or(200);

    println!("{}", config.to_json()?);
    println!("Environment: {}", config.env_id());
    println!("{:>6} {:>8} {:>9} {:>8}", "epoch", "forward", "backward", "beta");
    for epoch in (0..=epochs).step_by(10) {
        let (forward, backward) = config.kwargs.rollout_lengths(epoch);
        println!(
            "{:>6} {:>8} {:>9} {:>8.4}",
            epoch,
            forward,
            backward,
            config.kwargs.beta(epoch)
        );
    }
    Ok(())
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
