//! Built-in profile templates.
//!
//! Both attach the instance to the default LXD bridge. Block devices are added
//! per run from the created volumes.

/// Profile for virtual machines.
pub const VM_PROFILE: &str = r#"
config:
  security.secureboot: "false"
devices:
  eth0:
    name: eth0
    network: lxdbr0
    type: nic
"#;

/// Profile for system containers. cephadm runs its daemons in nested containers and
/// needs access to host kernel modules.
pub const CONTAINER_PROFILE: &str = r#"
config:
  security.privileged: "true"
  security.nesting: "true"
  linux.kernel_modules: overlay,rbd,nbd
  raw.lxc: |-
    lxc.apparmor.profile=unconfined
    lxc.cgroup.devices.allow=a
    lxc.cap.drop=
devices:
  eth0:
    name: eth0
    network: lxdbr0
    type: nic
"#;
