//! Topologies bundled with the library.
//!
//! These are embedded at compile time and always available, so the command
//! line and tests can run a realistic graph without any file on disk.

use crate::Topology;

/// Names of the factory topologies.
pub static FACTORY_TOPOLOGY_NAMES: &[&str] =
    &["playback", "capture", "mixer", "src-playback", "dual-core"];

static FACTORY_TOPOLOGIES_TOML: &[(&str, &str)] = &[
    ("playback", PLAYBACK),
    ("capture", CAPTURE),
    ("mixer", MIXER),
    ("src-playback", SRC_PLAYBACK),
    ("dual-core", DUAL_CORE),
];

/// Host to speaker through a half-gain volume.
const PLAYBACK: &str = r#"
name = "playback"
description = "host -> volume -> dai"

[[pipeline]]
id = 1
sched_comp = 3
source = 1
sink = 3

[[component]]
id = 1
kind = "host"
pipeline = 1

[[component]]
id = 2
kind = "volume"
pipeline = 1
[component.options]
gain = 50

[[component]]
id = 3
kind = "dai"
pipeline = 1

[[buffer]]
id = 10
pipeline = 1
size = 768
from = 1
to = 2

[[buffer]]
id = 11
pipeline = 1
size = 768
from = 2
to = 3

[[stream]]
pipeline = 1
host = 1
"#;

/// Microphone to host.
const CAPTURE: &str = r#"
name = "capture"
description = "dai -> volume -> host"

[[pipeline]]
id = 1
sched_comp = 3
source = 3
sink = 1

[[component]]
id = 3
kind = "dai"
pipeline = 1
direction = "capture"

[[component]]
id = 2
kind = "volume"
pipeline = 1
direction = "capture"

[[component]]
id = 1
kind = "host"
pipeline = 1
direction = "capture"

[[buffer]]
id = 10
pipeline = 1
size = 768
from = 3
to = 2

[[buffer]]
id = 11
pipeline = 1
size = 768
from = 2
to = 1

[[stream]]
pipeline = 1
host = 1
"#;

/// Two playback streams mixed into one port. The second stream's pipeline
/// is scheduled by the first pipeline's DAI.
const MIXER: &str = r#"
name = "mixer"
description = "host -> mixer -> dai, plus host -> volume -> mixer"

[[pipeline]]
id = 1
sched_comp = 3
source = 1
sink = 3

[[pipeline]]
id = 2
sched_comp = 3
source = 21
sink = 22

[[component]]
id = 1
kind = "host"
pipeline = 1

[[component]]
id = 2
kind = "mixer"
pipeline = 1

[[component]]
id = 3
kind = "dai"
pipeline = 1

[[component]]
id = 21
kind = "host"
pipeline = 2

[[component]]
id = 22
kind = "volume"
pipeline = 2
[component.options]
gain = 25

[[buffer]]
id = 10
pipeline = 1
size = 768
from = 1
to = 2

[[buffer]]
id = 11
pipeline = 1
size = 768
from = 2
to = 3

[[buffer]]
id = 30
pipeline = 2
size = 768
from = 21
to = 22

[[buffer]]
id = 31
pipeline = 2
size = 768
from = 22
to = 2

[[stream]]
pipeline = 1
host = 1

[[stream]]
pipeline = 2
host = 21
"#;

/// A 44.1 kHz host stream played on a 48 kHz port.
const SRC_PLAYBACK: &str = r#"
name = "src-playback"
description = "host (44.1 kHz) -> src -> dai (48 kHz)"

[[pipeline]]
id = 1
sched_comp = 3
source = 1
sink = 3

[[component]]
id = 1
kind = "host"
pipeline = 1

[[component]]
id = 2
kind = "src"
pipeline = 1
[component.options]
rate = 48000

[[component]]
id = 3
kind = "dai"
pipeline = 1

[[buffer]]
id = 10
pipeline = 1
size = 768
from = 1
to = 2

[[buffer]]
id = 11
pipeline = 1
size = 768
from = 2
to = 3

[[stream]]
pipeline = 1
host = 1
rate = 44100
"#;

/// Playback owned by the secondary core.
const DUAL_CORE: &str = r#"
name = "dual-core"
description = "host -> volume -> dai on core 1"
cores = 2

[[pipeline]]
id = 1
core = 1
sched_comp = 3
source = 1
sink = 3

[[component]]
id = 1
kind = "host"
pipeline = 1

[[component]]
id = 2
kind = "volume"
pipeline = 1

[[component]]
id = 3
kind = "dai"
pipeline = 1

[[buffer]]
id = 10
pipeline = 1
size = 768
from = 1
to = 2

[[buffer]]
id = 11
pipeline = 1
size = 768
from = 2
to = 3

[[stream]]
pipeline = 1
host = 1
"#;

/// All factory topologies.
pub fn factory_topologies() -> Vec<Topology> {
    FACTORY_TOPOLOGIES_TOML
        .iter()
        .filter_map(|(_, toml)| toml.parse().ok())
        .collect()
}

/// Factory topology called `name` (case-insensitive).
pub fn get_factory_topology(name: &str) -> Option<Topology> {
    FACTORY_TOPOLOGIES_TOML
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .and_then(|(_, toml)| toml.parse().ok())
}

/// Returns true if `name` is a factory topology.
pub fn is_factory_topology(name: &str) -> bool {
    FACTORY_TOPOLOGY_NAMES
        .iter()
        .any(|n| n.eq_ignore_ascii_case(name))
}
