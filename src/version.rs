//! 版本信息与兼容性判断
//!
//! 版本号取自 Cargo 包版本，在编译期解析为三个整数常量。

/// 主版本号
pub const VERSION_MAJOR: u32 = parse_component(env!("CARGO_PKG_VERSION_MAJOR"));

/// 次版本号
pub const VERSION_MINOR: u32 = parse_component(env!("CARGO_PKG_VERSION_MINOR"));

/// 修订号
pub const VERSION_PATCH: u32 = parse_component(env!("CARGO_PKG_VERSION_PATCH"));

/// 返回库的主版本号。
///
/// 可用于显示库版本，或检查客户端是否与动态链接的库版本兼容。
pub fn version_major() -> u32 {
    VERSION_MAJOR
}

/// 返回库的次版本号
pub fn version_minor() -> u32 {
    VERSION_MINOR
}

/// 返回库的修订号
pub fn version_patch() -> u32 {
    VERSION_PATCH
}

/// 判断编译进来的库版本是否与传入的版本号兼容
///
/// - 主版本 > 0：主版本相同，且库的 (minor, patch) 不低于请求的版本
/// - 主版本 = 0：次版本必须相同；次版本为 0 时修订号也必须完全一致
pub fn version_is_compatible(major: u32, minor: u32, patch: u32) -> bool {
    if VERSION_MAJOR != major {
        return false;
    }

    if VERSION_MAJOR > 0 {
        return VERSION_MINOR > minor || (VERSION_MINOR == minor && VERSION_PATCH >= patch);
    }

    // 0.x 版本之间不保证兼容
    if VERSION_MINOR > 0 {
        VERSION_MINOR == minor && VERSION_PATCH >= patch
    } else {
        VERSION_MINOR == minor && VERSION_PATCH == patch
    }
}

const fn parse_component(s: &str) -> u32 {
    let bytes = s.as_bytes();
    let mut value = 0u32;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as u32;
        i += 1;
    }
    value
}
