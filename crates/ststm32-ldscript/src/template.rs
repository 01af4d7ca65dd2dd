//! Linker script templates.
//!
//! Templates use `$name` / `${name}` placeholders, with `$$` standing for a
//! literal dollar sign. Every placeholder must have a value.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{LinkerError, Result};

/// Default GCC linker script for a single-bank STM32 part.
///
/// Placeholders: `$stack` (initial stack pointer), `$ram` and `$flash`
/// (region lengths with a `K` suffix).
pub const BUILTIN_TEMPLATE: &str = r#"/* Generated for RAM = $ram, FLASH = $flash */

ENTRY(Reset_Handler)

/* Highest address of the user mode stack */
_estack = $stack;

_Min_Heap_Size = 0x200;
_Min_Stack_Size = 0x400;

MEMORY
{
  RAM (xrw)   : ORIGIN = 0x20000000, LENGTH = $ram
  FLASH (rx)  : ORIGIN = 0x8000000, LENGTH = $flash
}

SECTIONS
{
  .isr_vector :
  {
    . = ALIGN(4);
    KEEP(*(.isr_vector))
    . = ALIGN(4);
  } >FLASH

  .text :
  {
    . = ALIGN(4);
    *(.text)
    *(.text*)
    *(.glue_7)
    *(.glue_7t)
    *(.eh_frame)
    KEEP (*(.init))
    KEEP (*(.fini))
    . = ALIGN(4);
    _etext = .;
  } >FLASH

  .rodata :
  {
    . = ALIGN(4);
    *(.rodata)
    *(.rodata*)
    . = ALIGN(4);
  } >FLASH

  .ARM.extab : { *(.ARM.extab* .gnu.linkonce.armextab.*) } >FLASH
  .ARM : {
    __exidx_start = .;
    *(.ARM.exidx*)
    __exidx_end = .;
  } >FLASH

  .preinit_array :
  {
    PROVIDE_HIDDEN (__preinit_array_start = .);
    KEEP (*(.preinit_array*))
    PROVIDE_HIDDEN (__preinit_array_end = .);
  } >FLASH
  .init_array :
  {
    PROVIDE_HIDDEN (__init_array_start = .);
    KEEP (*(SORT(.init_array.*)))
    KEEP (*(.init_array*))
    PROVIDE_HIDDEN (__init_array_end = .);
  } >FLASH
  .fini_array :
  {
    PROVIDE_HIDDEN (__fini_array_start = .);
    KEEP (*(SORT(.fini_array.*)))
    KEEP (*(.fini_array*))
    PROVIDE_HIDDEN (__fini_array_end = .);
  } >FLASH

  _sidata = LOADADDR(.data);

  .data :
  {
    . = ALIGN(4);
    _sdata = .;
    *(.data)
    *(.data*)
    . = ALIGN(4);
    _edata = .;
  } >RAM AT> FLASH

  . = ALIGN(4);
  .bss :
  {
    _sbss = .;
    __bss_start__ = _sbss;
    *(.bss)
    *(.bss*)
    *(COMMON)
    . = ALIGN(4);
    _ebss = .;
    __bss_end__ = _ebss;
  } >RAM

  ._user_heap_stack :
  {
    . = ALIGN(8);
    PROVIDE ( end = . );
    PROVIDE ( _end = . );
    . = . + _Min_Heap_Size;
    . = . + _Min_Stack_Size;
    . = ALIGN(8);
  } >RAM

  /DISCARD/ :
  {
    libc.a ( * )
    libm.a ( * )
    libgcc.a ( * )
  }

  .ARM.attributes 0 : { *(.ARM.attributes) }
}
"#;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(?:(\$)|([_A-Za-z][_A-Za-z0-9]*)|\{([_A-Za-z][_A-Za-z0-9]*)\}|())")
            .expect("placeholder pattern is valid")
    })
}

/// A linker script template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkerTemplate {
    text: String,
}

impl LinkerTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The default template shipped with this crate.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_TEMPLATE)
    }

    /// Read a template file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(std::fs::read_to_string(path)?))
    }

    /// Template source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace every placeholder with its value.
    pub fn substitute(&self, vars: &BTreeMap<&str, String>) -> Result<String> {
        let mut out = String::with_capacity(self.text.len());
        let mut last = 0;
        for caps in placeholder_regex().captures_iter(&self.text) {
            let whole = caps.get(0).expect("group 0 always participates");
            out.push_str(&self.text[last..whole.start()]);
            last = whole.end();

            if caps.get(1).is_some() {
                out.push('$');
                continue;
            }
            let name = match caps.get(2).or_else(|| caps.get(3)) {
                Some(name) => name.as_str(),
                None => {
                    return Err(LinkerError::InvalidPlaceholder {
                        offset: whole.start(),
                    })
                }
            };
            match vars.get(name) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(LinkerError::MissingPlaceholder {
                        name: name.to_string(),
                    })
                }
            }
        }
        out.push_str(&self.text[last..]);
        Ok(out)
    }
}
