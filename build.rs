//! Build script for vpcfw
//!
//! Embeds build-time information (git commit, dirty status, build timestamp)
//! used by `vpcfw --version`.

fn main() {
    println!("cargo:rerun-if-env-changed=VPCFW_DEFAULT_POLICY_PATH");

    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build info");
}
