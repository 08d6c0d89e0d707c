//! Gateway job configs in their wire (JSON) form.

use serde_json::{json, Value};

/// Two well-separated 2-D Gaussian clouds, 32 points each.
pub const SEPARATED_GAUSSIANS: (&str, &str) = ("gaussian:-2,0:0.3:32", "gaussian:2,0:0.3:32");

/// `hjb.pde` on an `n × n` grid over `[-2, 2]²` with a bounded single
/// integrator and unit quadratic cost.
pub fn pde_config(n: usize) -> Value {
    let h = 4.0 / (n.max(2) - 1) as f64;
    json!({
        "grid": { "shape": [n, n], "spacing": [h, h], "origin": [-2.0, -2.0] },
        "dynamics": {
            "type": "single_integrator",
            "options": { "dimension": 2, "controlLimit": 2.0 }
        },
        "cost": {
            "type": "quadratic",
            "stateWeights": [1.0, 1.0],
            "controlWeights": [1.0, 1.0]
        },
        "tolerance": 1e-3,
        "controlResolution": 0.5
    })
}

/// [`pde_config`] with a rollout of the solved policy inside the job.
pub fn pde_config_with_rollout(n: usize, start: [f64; 2], steps: usize, dt: f64) -> Value {
    let mut config = pde_config(n);
    config["rollout"] = json!({ "start": start, "steps": steps, "dt": dt });
    config
}

/// `hjb.mdp` on the same problem as [`pde_config`].
pub fn mdp_config(n: usize) -> Value {
    let mut config = pde_config(n);
    if let Some(map) = config.as_object_mut() {
        map.remove("tolerance");
        map.insert("discount".into(), json!(0.9));
        map.insert("dt".into(), json!(0.1));
    }
    config
}

/// Short `diffusion.fp` run on a 16 × 16 grid.
pub fn fp_config(steps: usize) -> Value {
    json!({ "grid": [16, 16], "steps": steps, "dt": 0.01, "seed": 11 })
}

/// Short `diffusion.sde` run.
pub fn sde_config(particles: usize, steps: usize) -> Value {
    json!({ "grid": [16, 16], "particles": particles, "steps": steps, "dt": 0.01, "seed": 5 })
}
