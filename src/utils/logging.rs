/// 日志工具模块
///
/// 提供日志初始化和输出格式化的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志
///
/// `RUST_LOG` 优先；未设置时按 `verbose` 选择 `debug` 或 `info`。
/// 重复调用是安全的（测试里常见）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `total`: 待查询号码数量
/// - `max_concurrent`: 最大并发数
/// - `cache_backend`: 缓存后端名称
pub fn log_startup(total: usize, max_concurrent: usize, cache_backend: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 「No llame」登记查询");
    info!("📋 待查询号码: {}", total);
    info!("📊 最大并发数: {}", max_concurrent);
    info!("💾 缓存后端: {}", cache_backend);
    info!("{}", "=".repeat(60));
}

/// 批量查询统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckTally {
    /// 已登记
    pub registered: usize,
    /// 未登记
    pub not_registered: usize,
    /// 结果未知（验证码用尽、页面结构异常）
    pub unknown: usize,
    /// 失败（号码无效、网络错误、验证码无法识别）
    pub failed: usize,
    /// 命中缓存
    pub from_cache: usize,
}

impl CheckTally {
    pub fn total(&self) -> usize {
        self.registered + self.not_registered + self.unknown + self.failed
    }
}

/// 打印最终统计信息
///
/// # 参数
/// - `tally`: 统计结果
pub fn print_final_stats(tally: &CheckTally) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部查询完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📵 已登记: {}/{}", tally.registered, tally.total());
    info!("📞 未登记: {}", tally.not_registered);
    info!("❔ 结果未知: {}", tally.unknown);
    info!("❌ 失败: {}", tally.failed);
    info!("💾 命中缓存: {}", tally.from_cache);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_text("ñandú ñandú", 5), "ñandú...");
        assert_eq!(truncate_text("corto", 10), "corto");
    }

    #[test]
    fn tally_total_excludes_cache_hits() {
        let tally = CheckTally {
            registered: 2,
            not_registered: 1,
            unknown: 1,
            failed: 1,
            from_cache: 3,
        };
        assert_eq!(tally.total(), 5);
    }
}
