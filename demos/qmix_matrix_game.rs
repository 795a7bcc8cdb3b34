// Demonstration: train QMIX on a two-agent cooperative matrix game.
//
// Run:
//   RUST_LOG=info cargo run --example qmix_matrix_game -- --steps 2000 --seed 0

use std::env;

use rand::{rngs::StdRng, SeedableRng};
use rl_lab::algorithms::mbrl::Schedule;
use rl_lab::algorithms::qmix::{
    EpsilonGreedy, QmixConfig, QmixTrainer, ReplayBuffer, TargetUpdate, Transition,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Team payoff indexed by `[action_0][action_1]`.
const PAYOFF: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 4.0]];

fn main() -> rl_lab::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let steps: usize = arg_value(&args, "--steps")
        .and_then(|s| s.parse().ok())
        .unwrap_or(2000);
    let seed: u64 = arg_value(&args, "--seed")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let config = QmixConfig {
        hidden_dim: 32,
        lr: 1e-3,
        target_update: TargetUpdate::Hard { interval: 50 },
        seed: seed as i64,
        ..QmixConfig::new(vec![2, 2], vec![3, 3], 2)
    };
    let mut trainer = QmixTrainer::new(config)?;
    let mut buffer = ReplayBuffer::new(5000)?;
    let mut policy =
        EpsilonGreedy::with_schedule(Schedule::new(0.0, steps as f64 * 0.8, 1.0, 0.05), seed);
    let mut rng = StdRng::seed_from_u64(seed);

    // One-step episodes: every agent sees its own id, the state is constant.
    let observations = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
    let state = vec![1.0, 1.0];

    for step in 0..steps {
        let q_list = trainer.generate_q_list(&observations)?;
        let actions = policy.select_actions(&q_list);
        buffer.push(Transition {
            observations: observations.clone(),
            actions: actions.clone(),
            next_observations: observations.clone(),
            state: state.clone(),
            next_state: state.clone(),
            team_reward: PAYOFF[actions[0]][actions[1]],
            done: true,
        })?;

        if buffer.len() >= 64 {
            let batch = buffer.sample(32, &mut rng)?;
            let loss = trainer.train(&batch)?;
            if step % 200 == 0 {
                info!(step, loss, epsilon = policy.epsilon(), "training");
            }
        }
    }

    let q_list = trainer.generate_q_list(&observations)?;
    let greedy = EpsilonGreedy::greedy_actions(&q_list);
    println!("Policy: {}", policy.name());
    println!("Greedy joint action: {:?}", greedy);
    println!("Team payoff:         {}", PAYOFF[greedy[0]][greedy[1]]);
    for (agent, q) in q_list.iter().enumerate() {
        println!("  agent {agent} Q-values: {q:?}");
    }
    Ok(())
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
