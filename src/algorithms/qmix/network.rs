//! QMIX networks built on tch-rs (PyTorch bindings).
//!
//! A [`QmixNetwork`] bundles one [`AgentQNetwork`] per agent with a
//! [`MixingNetwork`] in a single variable store, so the main and target
//! copies can be synchronized store-to-store.

use tch::{nn, nn::Module, nn::ModuleT, Device, Tensor};

use super::config::QmixConfig;

/// Linear layer with Xavier-normal weights and zero bias.
fn xavier_linear(p: nn::Path, in_dim: usize, out_dim: usize) -> nn::Linear {
    let stdev = (2.0 / (in_dim + out_dim) as f64).sqrt();
    nn::linear(
        p,
        in_dim as i64,
        out_dim as i64,
        nn::LinearConfig {
            ws_init: nn::Init::Randn { mean: 0.0, stdev },
            bs_init: Some(nn::Init::Const(0.0)),
            bias: true,
        },
    )
}

/// Independent Q-network for one agent.
///
/// Architecture: `obs_dim → hidden → (hidden → hidden) × N → action_dim`
/// with ReLU activations and a linear output.
pub struct AgentQNetwork {
    net: nn::SequentialT,
    observation_dim: usize,
    action_dim: usize,
}

impl AgentQNetwork {
    pub fn new(
        p: &nn::Path,
        observation_dim: usize,
        hidden_dim: usize,
        hidden_layer_count: usize,
        action_dim: usize,
    ) -> Self {
        let mut net = nn::seq_t()
            .add(xavier_linear(p / "fc_obs", observation_dim, hidden_dim))
            .add_fn(|x| x.relu());
        for j in 0..hidden_layer_count {
            net = net
                .add(xavier_linear(
                    p / format!("fc_hidden{j}"),
                    hidden_dim,
                    hidden_dim,
                ))
                .add_fn(|x| x.relu());
        }
        net = net.add(xavier_linear(p / "q_value", hidden_dim, action_dim));

        Self {
            net,
            observation_dim,
            action_dim,
        }
    }

    /// Maps `[batch, obs_dim]` observations to `[batch, action_dim]` Q-values.
    pub fn forward_t(&self, obs: &Tensor, train: bool) -> Tensor {
        self.net.forward_t(obs, train)
    }

    pub fn observation_dim(&self) -> usize {
        self.observation_dim
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }
}

/// Monotonic mixing hypernetwork.
///
/// Combines one chosen Q-value per agent into a joint Q-value. Both mixing
/// weight tensors are produced from the global state and passed through
/// `abs()`, so the output never decreases when a single agent's Q-value
/// increases.
pub struct MixingNetwork {
    hyper_w1: nn::Linear,
    hyper_b1: nn::Linear,
    hyper_w2: nn::Linear,
    hyper_b2_1: nn::Linear,
    hyper_b2_2: nn::Linear,
    agent_count: usize,
    embed_dim: usize,
}

impl MixingNetwork {
    pub fn new(p: &nn::Path, state_dim: usize, embed_dim: usize, agent_count: usize) -> Self {
        Self {
            hyper_w1: xavier_linear(p / "hyper_w1", state_dim, embed_dim * agent_count),
            hyper_b1: xavier_linear(p / "hyper_b1", state_dim, embed_dim),
            hyper_w2: xavier_linear(p / "hyper_w2", state_dim, embed_dim),
            hyper_b2_1: xavier_linear(p / "hyper_b2_1", state_dim, embed_dim),
            hyper_b2_2: xavier_linear(p / "hyper_b2_2", embed_dim, 1),
            agent_count,
            embed_dim,
        }
    }

    /// Mixes `agent_count` tensors of shape `[batch, 1]` into `[batch, 1]`.
    pub fn forward(&self, q_list: &[Tensor], state: &Tensor) -> Tensor {
        let n = self.agent_count as i64;
        let e = self.embed_dim as i64;

        let q_all = Tensor::cat(q_list, 1).view([-1, 1, n]);

        // First layer
        let w1 = self.hyper_w1.forward(state).abs().view([-1, n, e]);
        let b1 = self.hyper_b1.forward(state).view([-1, 1, e]);
        let hidden = (q_all.bmm(&w1) + b1).elu();

        // Second layer with a state-dependent bias
        let w2 = self.hyper_w2.forward(state).abs().view([-1, e, 1]);
        let v = self
            .hyper_b2_2
            .forward(&self.hyper_b2_1.forward(state).relu())
            .view([-1, 1, 1]);

        (hidden.bmm(&w2) + v).view([-1, 1])
    }
}

/// Per-agent Q-networks plus mixer, owning their variable store.
pub struct QmixNetwork {
    vs: nn::VarStore,
    agents: Vec<AgentQNetwork>,
    mixer: MixingNetwork,
}

impl QmixNetwork {
    /// Builds the network described by `config` on `device`.
    pub fn new(config: &QmixConfig, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let agents_path = &root / "agents";
        let agents = config
            .observation_dims
            .iter()
            .zip(config.action_dims.iter())
            .enumerate()
            .map(|(i, (&obs_dim, &action_dim))| {
                AgentQNetwork::new(
                    &(&agents_path / i),
                    obs_dim,
                    config.hidden_dim,
                    config.hidden_layer_count,
                    action_dim,
                )
            })
            .collect();
        let mixer = MixingNetwork::new(
            &(&root / "mixer"),
            config.state_dim,
            config.hidden_dim,
            config.agent_count(),
        );

        Self { vs, agents, mixer }
    }

    /// Runs every agent's network on its own observation batch.
    pub fn agent_q_values(&self, observations: &[Tensor], train: bool) -> Vec<Tensor> {
        self.agents
            .iter()
            .zip(observations.iter())
            .map(|(agent, obs)| agent.forward_t(obs, train))
            .collect()
    }

    /// Mixes per-agent chosen Q-values into the joint Q-value.
    pub fn mix(&self, chosen: &[Tensor], state: &Tensor) -> Tensor {
        self.mixer.forward(chosen, state)
    }

    pub fn agents(&self) -> &[AgentQNetwork] {
        &self.agents
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }

    /// Returns a reference to the variable store.
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    /// Returns a mutable reference to the variable store for optimization.
    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Kind;

    const CPU_FLOAT: (Kind, Device) = (Kind::Float, Device::Cpu);

    fn config() -> QmixConfig {
        QmixConfig {
            hidden_dim: 16,
            hidden_layer_count: 2,
            ..QmixConfig::new(vec![4, 7, 3], vec![2, 5, 3], 9)
        }
    }

    #[test]
    fn agent_q_values_have_per_agent_shapes() {
        let cfg = config();
        let net = QmixNetwork::new(&cfg, Device::Cpu);
        let obs: Vec<Tensor> = cfg
            .observation_dims
            .iter()
            .map(|&d| Tensor::randn([8, d as i64], CPU_FLOAT))
            .collect();
        let qs = net.agent_q_values(&obs, false);
        assert_eq!(qs.len(), 3);
        for (q, &a) in qs.iter().zip(cfg.action_dims.iter()) {
            assert_eq!(q.size(), &[8, a as i64]);
        }
    }

    #[test]
    fn mixer_output_is_one_value_per_row() {
        let cfg = config();
        let net = QmixNetwork::new(&cfg, Device::Cpu);
        let chosen: Vec<Tensor> = (0..3).map(|_| Tensor::randn([8, 1], CPU_FLOAT)).collect();
        let state = Tensor::randn([8, 9], CPU_FLOAT);
        assert_eq!(net.mix(&chosen, &state).size(), &[8, 1]);
    }

    #[test]
    fn mixer_is_monotonic_in_each_agent() {
        let vs = nn::VarStore::new(Device::Cpu);
        let mixer = MixingNetwork::new(&vs.root(), 5, 8, 3);
        let state = Tensor::randn([32, 5], CPU_FLOAT);
        let qs: Vec<Tensor> = (0..3).map(|_| Tensor::randn([32, 1], CPU_FLOAT)).collect();
        let base = mixer.forward(&qs, &state);

        for agent in 0..3 {
            for delta in [0.1, 1.0, 10.0] {
                let mut bumped: Vec<Tensor> = qs.iter().map(|q| q.shallow_clone()).collect();
                bumped[agent] = &qs[agent] + delta;
                let out = mixer.forward(&bumped, &state);
                let min_diff = (&out - &base).min().double_value(&[]);
                assert!(
                    min_diff >= -1e-5,
                    "agent {agent} delta {delta}: joint Q decreased by {min_diff}"
                );
            }
        }
    }

    #[test]
    fn biases_start_at_zero() {
        let net = QmixNetwork::new(&config(), Device::Cpu);
        let vars = net.var_store().variables();
        let biases: Vec<_> = vars.iter().filter(|(n, _)| n.ends_with("bias")).collect();
        // 3 agents × (fc_obs + 2 hidden + q_value) + 5 hypernetworks
        assert_eq!(biases.len(), 3 * 4 + 5);
        for (name, b) in biases {
            let total = b.abs().sum(Kind::Float).double_value(&[]);
            assert_eq!(total, 0.0, "{name} is not zero-initialized");
        }
    }

    #[test]
    fn layers_are_named_per_agent() {
        let net = QmixNetwork::new(&config(), Device::Cpu);
        let vars = net.var_store().variables();
        assert!(vars.contains_key("agents.0.fc_obs.weight"));
        assert!(vars.contains_key("agents.2.fc_hidden1.weight"));
        assert!(vars.contains_key("agents.1.q_value.bias"));
        assert!(vars.contains_key("mixer.hyper_b2_2.weight"));
        assert_eq!(vars["agents.1.fc_obs.weight"].size(), &[16, 7]);
    }

    #[test]
    fn weights_follow_xavier_normal_scale() {
        let vs = nn::VarStore::new(Device::Cpu);
        let layer = xavier_linear(&vs.root() / "wide", 400, 600);
        let expected = (2.0f64 / 1000.0).sqrt();
        let std = layer.ws.std(true).double_value(&[]);
        let mean = layer.ws.mean(Kind::Float).double_value(&[]);
        assert!(
            (std - expected).abs() < 0.02 * expected,
            "std {std}, expected {expected}"
        );
        assert!(mean.abs() < 1e-3, "mean {mean}");
    }

    #[test]
    fn agent_networks_keep_their_dimensions() {
        let cfg = config();
        let net = QmixNetwork::new(&cfg, Device::Cpu);
        assert_eq!(net.agent_count(), cfg.agent_count());
        for ((agent, &obs_dim), &action_dim) in net
            .agents()
            .iter()
            .zip(cfg.observation_dims.iter())
            .zip(cfg.action_dims.iter())
        {
            assert_eq!(agent.observation_dim(), obs_dim);
            assert_eq!(agent.action_dim(), action_dim);
        }
    }
}
