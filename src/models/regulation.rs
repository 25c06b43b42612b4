/// 合规法规枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Regulation {
    /// 欧盟通用数据保护条例
    Gdpr,
    /// 美国健康保险流通与责任法案
    Hipaa,
    /// 萨班斯-奥克斯利法案
    Sox,
    /// 支付卡行业数据安全标准
    PciDss,
    /// 信息安全管理体系
    Iso27001,
}

impl Regulation {
    /// 获取法规代码
    pub fn code(self) -> &'static str {
        match self {
            Regulation::Gdpr => "gdpr",
            Regulation::Hipaa => "hipaa",
            Regulation::Sox => "sox",
            Regulation::PciDss => "pci-dss",
            Regulation::Iso27001 => "iso-27001",
        }
    }

    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            Regulation::Gdpr => "GDPR",
            Regulation::Hipaa => "HIPAA",
            Regulation::Sox => "SOX",
            Regulation::PciDss => "PCI DSS",
            Regulation::Iso27001 => "ISO/IEC 27001",
        }
    }

    /// 审查要点，拼接进分析提示词
    pub fn guidance(self) -> &'static str {
        match self {
            Regulation::Gdpr => {
                "lawful basis for processing, data subject rights, retention limits, \
                 cross-border transfers, breach notification within 72 hours"
            }
            Regulation::Hipaa => {
                "protected health information handling, minimum necessary use, \
                 business associate agreements, access controls, audit logging"
            }
            Regulation::Sox => {
                "internal controls over financial reporting, segregation of duties, \
                 record retention, management certification"
            }
            Regulation::PciDss => {
                "cardholder data storage, encryption in transit and at rest, \
                 network segmentation, access restriction, vulnerability management"
            }
            Regulation::Iso27001 => {
                "information security policy, risk assessment and treatment, \
                 asset management, incident management, continual improvement"
            }
        }
    }

    /// 从字符串解析法规（忽略大小写和分隔符）
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "gdpr" => Some(Regulation::Gdpr),
            "hipaa" => Some(Regulation::Hipaa),
            "sox" | "sarbanesoxley" => Some(Regulation::Sox),
            "pcidss" | "pci" => Some(Regulation::PciDss),
            "iso27001" | "isoiec27001" => Some(Regulation::Iso27001),
            _ => None,
        }
    }
}

impl Default for Regulation {
    fn default() -> Self {
        Regulation::Gdpr
    }
}

impl std::fmt::Display for Regulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
