use serde::{Deserialize, Serialize};

/// Services a customer can pick from the WhatsApp menu.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    RevisaoGeral,
    AjusteFreios,
    AjusteMarchas,
    TrocaPneus,
    TrocaCamera,
    LubrificacaoCorrente,
    LimpezaCompleta,
    AlinhamentoRodas,
    Outro,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 9] = [
        ServiceKind::RevisaoGeral,
        ServiceKind::AjusteFreios,
        ServiceKind::AjusteMarchas,
        ServiceKind::TrocaPneus,
        ServiceKind::TrocaCamera,
        ServiceKind::LubrificacaoCorrente,
        ServiceKind::LimpezaCompleta,
        ServiceKind::AlinhamentoRodas,
        ServiceKind::Outro,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ServiceKind::RevisaoGeral => "revisao_geral",
            ServiceKind::AjusteFreios => "ajuste_freios",
            ServiceKind::AjusteMarchas => "ajuste_marchas",
            ServiceKind::TrocaPneus => "troca_pneus",
            ServiceKind::TrocaCamera => "troca_camera",
            ServiceKind::LubrificacaoCorrente => "lubrificacao_corrente",
            ServiceKind::LimpezaCompleta => "limpeza_completa",
            ServiceKind::AlinhamentoRodas => "alinhamento_rodas",
            ServiceKind::Outro => "outro",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceKind::RevisaoGeral => "Revisão Geral",
            ServiceKind::AjusteFreios => "Ajuste de Freios",
            ServiceKind::AjusteMarchas => "Ajuste de Marchas",
            ServiceKind::TrocaPneus => "Troca de Pneus",
            ServiceKind::TrocaCamera => "Troca de Câmera",
            ServiceKind::LubrificacaoCorrente => "Lubrificação da Corrente",
            ServiceKind::LimpezaCompleta => "Limpeza Completa",
            ServiceKind::AlinhamentoRodas => "Alinhamento de Rodas",
            ServiceKind::Outro => "Outro",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id.trim())
    }
}
